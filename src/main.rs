fn main() {
    if let Err(e) = optidoc_lib::run() {
        tracing::error!(error = %e, "OptiDoc failed to start");
        eprintln!("optidoc: {e}");
        std::process::exit(1);
    }
}

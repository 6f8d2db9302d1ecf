fn main() {
    if let Err(err) = chatgate::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

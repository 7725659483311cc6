fn main() {
    if let Err(err) = pipefile::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

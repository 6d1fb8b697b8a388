fn main() {
    #[cfg(feature = "cli")]
    memtrace::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("memtrace: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}

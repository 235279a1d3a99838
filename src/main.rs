fn main() {
    jobhook::cli::run()
}

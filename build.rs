fn main() {
    // Host builds need no environment; ESP-IDF builds export the toolchain
    // paths discovered by embuild.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

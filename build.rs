fn main() {
    // ESP-IDF link environment is only needed for the device binary.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

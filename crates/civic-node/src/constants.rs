pub(crate) const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub(crate) const DEFAULT_DATA_DIR: &str = "./data";
pub(crate) const DEFAULT_VERIFICATION_LIMIT: usize = 20;

pub trait ObjectFetcher {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String>;
}

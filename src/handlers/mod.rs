pub mod aliexpress;
pub mod amazon;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;

/// Product summary assembled from a vendor lookup. Absent optional fields
/// are simply omitted from the rendered reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub title: String,
    pub image_url: Option<String>,
    pub price: String,
    pub old_price: Option<String>,
    pub description: String,
}

/// Capability set every vendor implements. Handlers are cheap stateless
/// wrappers constructed per message pass from the current config snapshot.
#[async_trait]
pub trait VendorHandler: Send + Sync {
    /// Cheap, side-effect-free domain test.
    fn can_handle(&self, url: &str) -> bool;

    /// Vendor lookup. Fails closed: network, parsing, and missing-field
    /// errors are logged at this boundary and reported as `None`.
    async fn get_product_info(&self, url: &str) -> Option<ProductInfo>;

    /// Pure transformation of the original URL into an affiliate-tagged one.
    /// When the required identifier cannot be extracted, the URL comes back
    /// unchanged.
    fn create_affiliate_link(&self, url: &str) -> String;
}

/// Ordered handler registry; the dispatcher commits to the first match.
pub fn registry(config: &Arc<Config>, http: &reqwest::Client) -> Vec<Box<dyn VendorHandler>> {
    vec![
        Box::new(aliexpress::AliexpressHandler::new(
            config.clone(),
            http.clone(),
        )),
        Box::new(amazon::AmazonHandler::new(config.clone(), http.clone())),
    ]
}

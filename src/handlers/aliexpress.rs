use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use md5::{Digest, Md5};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ProductInfo, VendorHandler};
use crate::config::Config;

const API_PATH: &str = "/openapi/param2/2/portals.open/api.getPromotionProductDetail/";

static PRODUCT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/item/(\d+)\.html").expect("valid product id regex"));

/// Numeric product id from an `/item/<digits>.html` path segment.
pub fn extract_product_id(url: &str) -> Option<&str> {
    PRODUCT_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Legacy portals signature: MD5 over
/// `secret + api_path + <key,value pairs sorted by key, no separators> + secret`,
/// lowercase hex. The vendor API verifies this exact byte sequence; MD5 and
/// the separator-free concatenation cannot be swapped for anything stronger.
pub fn generate_signature(secret: &str, api_path: &str, params: &BTreeMap<String, String>) -> String {
    let mut sign_string = String::new();
    sign_string.push_str(secret);
    sign_string.push_str(api_path);
    for (key, value) in params {
        sign_string.push_str(key);
        sign_string.push_str(value);
    }
    sign_string.push_str(secret);

    let mut hasher = Md5::new();
    hasher.update(sign_string.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    result: Option<ProductDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetail {
    product_title: Option<String>,
    product_main_image_url: Option<String>,
    sale_price: Option<String>,
    original_price: Option<String>,
    product_description: Option<String>,
}

impl From<ProductDetail> for ProductInfo {
    fn from(detail: ProductDetail) -> Self {
        ProductInfo {
            title: detail.product_title.unwrap_or_default(),
            image_url: detail.product_main_image_url,
            price: detail.sale_price.unwrap_or_default(),
            old_price: detail.original_price,
            description: detail
                .product_description
                .unwrap_or_else(|| "Producto en AliExpress".to_string()),
        }
    }
}

pub struct AliexpressHandler {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl AliexpressHandler {
    pub fn new(config: Arc<Config>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn fetch_detail(&self, product_id: &str) -> Result<Option<ProductInfo>> {
        let mut params = BTreeMap::new();
        params.insert(
            "app_key".to_string(),
            self.config.aliexpress.app_key.clone(),
        );
        params.insert("productId".to_string(), product_id.to_string());
        params.insert(
            "timestamp".to_string(),
            Utc::now().timestamp_millis().to_string(),
        );
        let sign = generate_signature(&self.config.aliexpress.app_secret, API_PATH, &params);
        params.insert("sign".to_string(), sign);

        let response = self
            .client
            .get(&self.config.aliexpress.endpoint)
            .query(&params)
            .send()
            .await
            .context("Failed to reach AliExpress API")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("AliExpress API error ({})", status);
        }

        let detail: DetailResponse = response
            .json()
            .await
            .context("Failed to parse AliExpress response")?;

        Ok(detail.result.map(ProductInfo::from))
    }
}

#[async_trait]
impl VendorHandler for AliexpressHandler {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("aliexpress.com")
    }

    async fn get_product_info(&self, url: &str) -> Option<ProductInfo> {
        let product_id = extract_product_id(url)?;
        match self.fetch_detail(product_id).await {
            Ok(Some(product)) => Some(product),
            Ok(None) => {
                debug!("AliExpress returned no result for product {}", product_id);
                None
            }
            Err(e) => {
                warn!("AliExpress lookup failed for {}: {:#}", url, e);
                None
            }
        }
    }

    fn create_affiliate_link(&self, url: &str) -> String {
        // Plain append, the link format the vendor attributes on. A URL that
        // already carries a query string ends up with a second `?`.
        format!("{}?aff_id={}", url, self.config.aliexpress.aff_id)
    }
}

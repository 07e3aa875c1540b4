use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ProductInfo, VendorHandler};
use crate::config::Config;

static ASIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Z0-9]{10})(?:[/?]|$)").expect("valid ASIN regex"));

/// 10-character ASIN from a path segment bounded by `/`, `?` or end of string.
pub fn extract_asin(url: &str) -> Option<&str> {
    ASIN_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Affiliate link rebuilt from scratch: original query parameters are
/// dropped, unlike the AliExpress append strategy.
pub fn build_affiliate_link(asin: &str, country: &str, tag: &str) -> String {
    format!("https://www.amazon.{}/dp/{}?tag={}", country, asin, tag)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemLookupResponse {
    items_result: Option<ItemsResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResult {
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Item {
    item_info: Option<ItemInfo>,
    images: Option<Images>,
    offers: Option<Offers>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemInfo {
    title: Option<DisplayValue>,
    features: Option<DisplayValues>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DisplayValue {
    display_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DisplayValues {
    display_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Images {
    primary: Option<ImageSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageSet {
    large: Option<ImageUrl>,
}

#[derive(Debug, Deserialize)]
struct ImageUrl {
    #[serde(rename = "URL")]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Offers {
    listings: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Listing {
    price: Option<Price>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Price {
    display_amount: Option<String>,
    savings_basis: Option<String>,
}

/// First listing's price and first feature bullet, with explicit fallback
/// text where the response omits them. A missing title means no product.
fn product_from_item(item: Item) -> Option<ProductInfo> {
    let title = item.item_info.as_ref()?.title.as_ref()?.display_value.clone();

    let image_url = item
        .images
        .as_ref()
        .and_then(|i| i.primary.as_ref())
        .and_then(|p| p.large.as_ref())
        .map(|l| l.url.clone());

    let first_listing = item.offers.as_ref().and_then(|o| o.listings.first());
    let price = first_listing
        .and_then(|l| l.price.as_ref())
        .and_then(|p| p.display_amount.clone())
        .unwrap_or_else(|| "Precio no disponible".to_string());
    let old_price = first_listing
        .and_then(|l| l.price.as_ref())
        .and_then(|p| p.savings_basis.clone());

    let description = item
        .item_info
        .as_ref()
        .and_then(|i| i.features.as_ref())
        .and_then(|f| f.display_values.first().cloned())
        .unwrap_or_else(|| "Producto de Amazon".to_string());

    Some(ProductInfo {
        title,
        image_url,
        price,
        old_price,
        description,
    })
}

pub struct AmazonHandler {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl AmazonHandler {
    pub fn new(config: Arc<Config>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn fetch_item(&self, asin: &str) -> Result<Option<ProductInfo>> {
        let amazon = &self.config.amazon;
        let marketplace = format!("www.amazon.{}", amazon.country);
        let response = self
            .client
            .get(&amazon.endpoint)
            .query(&[
                ("ItemIds", asin),
                ("PartnerTag", amazon.affiliate_tag.as_str()),
                ("AccessKey", amazon.access_key.as_str()),
                ("SecretKey", amazon.secret_key.as_str()),
                ("Marketplace", marketplace.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach Amazon API")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Amazon API error ({})", status);
        }

        let lookup: ItemLookupResponse = response
            .json()
            .await
            .context("Failed to parse Amazon response")?;

        Ok(lookup
            .items_result
            .and_then(|r| r.items.into_iter().next())
            .and_then(product_from_item))
    }
}

#[async_trait]
impl VendorHandler for AmazonHandler {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("amazon.")
    }

    async fn get_product_info(&self, url: &str) -> Option<ProductInfo> {
        let asin = extract_asin(url)?;
        match self.fetch_item(asin).await {
            Ok(Some(product)) => Some(product),
            Ok(None) => {
                debug!("Amazon returned no item for ASIN {}", asin);
                None
            }
            Err(e) => {
                warn!("Amazon lookup failed for {}: {:#}", url, e);
                None
            }
        }
    }

    fn create_affiliate_link(&self, url: &str) -> String {
        match extract_asin(url) {
            Some(asin) => build_affiliate_link(
                asin,
                &self.config.amazon.country,
                &self.config.amazon.affiliate_tag,
            ),
            None => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_config() -> Arc<Config> {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "token"

            [aliexpress]
            app_key = "key"
            app_secret = "secret"
            aff_id = "aff"

            [amazon]
            access_key = "ak"
            secret_key = "sk"
            affiliate_tag = "mytag-21"
            country = "es"
            "#,
        )
        .unwrap();
        Arc::new(config)
    }

    fn make_handler() -> AmazonHandler {
        AmazonHandler::new(make_config(), reqwest::Client::new())
    }

    #[test]
    fn test_can_handle_requires_amazon_domain() {
        let handler = make_handler();
        assert!(handler.can_handle("https://www.amazon.es/dp/B08N5WRWNW"));
        assert!(handler.can_handle("https://www.amazon.com/dp/B08N5WRWNW"));
        assert!(!handler.can_handle("https://es.aliexpress.com/item/1.html"));
    }

    #[test]
    fn test_extract_asin_from_dp_path() {
        assert_eq!(
            extract_asin("https://www.amazon.com/dp/B08N5WRWNW/ref=sr_1_1"),
            Some("B08N5WRWNW")
        );
        assert_eq!(
            extract_asin("https://www.amazon.com/dp/B08N5WRWNW?th=1"),
            Some("B08N5WRWNW")
        );
        assert_eq!(
            extract_asin("https://www.amazon.com/dp/B08N5WRWNW"),
            Some("B08N5WRWNW")
        );
    }

    #[test]
    fn test_extract_asin_rejects_wrong_lengths() {
        assert_eq!(extract_asin("https://www.amazon.com/dp/B08N5WRWN"), None);
        assert_eq!(extract_asin("https://www.amazon.com/dp/B08N5WRWNW1"), None);
    }

    #[test]
    fn test_affiliate_link_discards_original_query() {
        let handler = make_handler();
        assert_eq!(
            handler.create_affiliate_link(
                "https://www.amazon.com/dp/B000123ABC/ref=x?psc=1&keywords=widget"
            ),
            "https://www.amazon.es/dp/B000123ABC?tag=mytag-21"
        );
    }

    #[test]
    fn test_affiliate_link_without_asin_is_unchanged() {
        let handler = make_handler();
        assert_eq!(
            handler.create_affiliate_link("https://www.amazon.es/gp/bestsellers"),
            "https://www.amazon.es/gp/bestsellers"
        );
    }

    #[test]
    fn test_item_response_maps_first_listing_and_feature() {
        let body = r#"{
            "ItemsResult": {
                "Items": [{
                    "ItemInfo": {
                        "Title": { "DisplayValue": "Widget" },
                        "Features": { "DisplayValues": ["Does things", "Second bullet"] }
                    },
                    "Images": {
                        "Primary": { "Large": { "URL": "https://img.example/w.jpg" } }
                    },
                    "Offers": {
                        "Listings": [
                            { "Price": { "DisplayAmount": "$9.99", "SavingsBasis": "$19.99" } },
                            { "Price": { "DisplayAmount": "$8.00" } }
                        ]
                    }
                }]
            }
        }"#;
        let lookup: ItemLookupResponse = serde_json::from_str(body).unwrap();
        let item = lookup.items_result.unwrap().items.into_iter().next().unwrap();
        let product = product_from_item(item).unwrap();
        assert_eq!(product.title, "Widget");
        assert_eq!(product.price, "$9.99");
        assert_eq!(product.old_price.as_deref(), Some("$19.99"));
        assert_eq!(product.description, "Does things");
        assert_eq!(product.image_url.as_deref(), Some("https://img.example/w.jpg"));
    }

    #[test]
    fn test_item_response_tolerates_missing_price_and_features() {
        let body = r#"{
            "ItemsResult": {
                "Items": [{
                    "ItemInfo": { "Title": { "DisplayValue": "Widget" } }
                }]
            }
        }"#;
        let lookup: ItemLookupResponse = serde_json::from_str(body).unwrap();
        let item = lookup.items_result.unwrap().items.into_iter().next().unwrap();
        let product = product_from_item(item).unwrap();
        assert_eq!(product.price, "Precio no disponible");
        assert_eq!(product.description, "Producto de Amazon");
        assert!(product.image_url.is_none());
        assert!(product.old_price.is_none());
    }

    #[test]
    fn test_item_without_title_is_no_product() {
        let body = r#"{ "ItemsResult": { "Items": [ {} ] } }"#;
        let lookup: ItemLookupResponse = serde_json::from_str(body).unwrap();
        let item = lookup.items_result.unwrap().items.into_iter().next().unwrap();
        assert!(product_from_item(item).is_none());
    }
}

use crate::handlers::ProductInfo;

/// Outbound reply: plain text, or an image with the composed text as caption.
/// Markup is inline HTML; the transport sets the parse mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Photo { image_url: String, caption: String },
}

/// Render the product summary plus the (shortened) affiliate link.
/// Old-price and description lines appear only when present.
pub fn compose_reply(product: &ProductInfo, link: &str) -> Reply {
    let mut caption = format!("<b>{}</b>\n", product.title);
    caption.push_str(&format!("💸 Precio: {}\n", product.price));
    if let Some(old_price) = &product.old_price {
        caption.push_str(&format!("💰 Antes: {}\n", old_price));
    }
    if !product.description.is_empty() {
        caption.push_str(&format!("📝 {}\n", product.description));
    }
    caption.push_str(&format!("🔗 {}", link));

    match &product.image_url {
        Some(image_url) => Reply::Photo {
            image_url: image_url.clone(),
            caption,
        },
        None => Reply::Text(caption),
    }
}

/// Fallback for URLs that produced no product: echo the link untouched.
pub fn raw_link_reply(url: &str) -> Reply {
    Reply::Text(format!("🔗 {}", url))
}

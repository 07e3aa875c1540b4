use crate::compose::{self, Reply};
use crate::extract::extract_urls;
use crate::handlers::VendorHandler;
use crate::shorten::Shorten;

/// One message-processing pass: every URL in the text becomes exactly one
/// reply, processed sequentially within this unit of work.
pub async fn process_message(
    text: &str,
    handlers: &[Box<dyn VendorHandler>],
    shortener: &dyn Shorten,
) -> Vec<Reply> {
    let mut replies = Vec::new();
    for url in extract_urls(text) {
        replies.push(process_url(url, handlers, shortener).await);
    }
    replies
}

async fn process_url(
    url: &str,
    handlers: &[Box<dyn VendorHandler>],
    shortener: &dyn Shorten,
) -> Reply {
    let Some(handler) = handlers.iter().find(|h| h.can_handle(url)) else {
        return compose::raw_link_reply(url);
    };

    // First match commits: a handler that comes up empty does not fall
    // through to the next one.
    let Some(product) = handler.get_product_info(url).await else {
        return compose::raw_link_reply(url);
    };

    let affiliate_link = handler.create_affiliate_link(url);
    let short_link = shortener.shorten(&affiliate_link).await;
    compose::compose_reply(&product, &short_link)
}

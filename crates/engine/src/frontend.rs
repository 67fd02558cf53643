use bytes::Bytes;
use gantry_core::StaticBundle;
use http::header::{self, HeaderValue};

/// Serves `path` out of `bundle`, or `None` when the bundle has no such file.
pub(crate) fn serve(bundle: &StaticBundle, path: &str) -> Option<http::Response<Bytes>> {
    let (name, contents) = bundle.get(path)?;
    let mut response = http::Response::new(contents.clone());
    if let Ok(value) = HeaderValue::from_str(content_type(name).as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Some(response)
}

fn content_type(name: &str) -> mime::Mime {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT_UTF_8,
        "json" | "map" => mime::APPLICATION_JSON,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "svg" => mime::IMAGE_SVG,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_assets_get_content_types() {
        let bundle = StaticBundle::new().insert("/index.html", "<html></html>").insert("/app.js", "let a;");

        let index = serve(&bundle, "/").unwrap();
        assert_eq!(index.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(index.body().as_ref(), b"<html></html>");

        let script = serve(&bundle, "/app.js").unwrap();
        assert_eq!(script.headers()[header::CONTENT_TYPE], "application/javascript; charset=utf-8");

        assert!(serve(&bundle, "/missing.css").is_none());
        assert_eq!(content_type("archive.bin"), mime::APPLICATION_OCTET_STREAM);
    }
}

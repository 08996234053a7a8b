use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin PostgREST / Storage client authenticated with the project key.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, content_type: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).context("invalid Supabase API key")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
                .context("invalid Supabase API key")?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).context("invalid content type")?,
        );

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: &[(&'static str, &str)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers("application/json")?;
        for (name, value) in extra_headers {
            headers.insert(HeaderName::from_static(*name), HeaderValue::from_str(value)?);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        check_status(response).await
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let prefer: &[(&'static str, &str)] = if method == Method::GET {
            &[]
        } else {
            &[("prefer", "return=representation")]
        };

        let response = self.send(method, path, body, prefer).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET with `Prefer: count=exact`; returns the rows and the total parsed
    /// from the `Content-Range` header (`0-9/42`, or `*/0` for no rows).
    pub async fn request_with_count<T>(&self, path: &str) -> Result<(T, u64)>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::GET, path, None, &[("prefer", "count=exact")])
            .await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| anyhow!("missing or malformed Content-Range header"))?;

        let data = response.json::<T>().await?;
        Ok((data, total))
    }

    /// Upload raw bytes to a Storage bucket, overwriting any existing object.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, bucket, object_path
        );
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(content_type)?;
        headers.insert("x-upsert", HeaderValue::from_static("true"));

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    pub fn public_object_url(&self, bucket: &str, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, object_path
        )
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await?;
    error!("API error ({}): {}", status, error_text);

    Err(match status.as_u16() {
        401 | 403 => anyhow!("Authentication error: {}", error_text),
        404 => anyhow!("Resource not found: {}", error_text),
        _ => anyhow!("API error ({}): {}", status, error_text),
    })
}

fn parse_content_range_total(raw: &str) -> Option<u64> {
    raw.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
    }
}

// Bluesky XRPC client - session-authenticated writes to the user's PDS.
//
// A thin reqwest wrapper with generic XRPC GET/POST helpers. The session
// from `com.atproto.server.createSession` is kept behind an RwLock so the
// trait methods only need `&self`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use atrium_api::com::atproto::identity::resolve_handle;
use atrium_api::com::atproto::server::create_session;
use chrono::SecondsFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::richtext::{detect_facets, DetectedKind};
use super::traits::{DestinationClient, Session};
use crate::models::{
    AspectRatio, BlobRef, DestinationPostRequest, Facet, FacetFeature, PostRef, ReplyRef,
};

const USER_AGENT: &str = "mastodon-to-bluesky/0.1";

const POST_COLLECTION: &str = "app.bsky.feed.post";

struct AuthSession {
    session: Session,
    access_jwt: String,
}

/// Authenticated XRPC client for one Bluesky account.
pub struct BlueskyClient {
    client: reqwest::Client,
    base_url: String,
    identifier: String,
    password: String,
    auth: RwLock<Option<AuthSession>>,
}

impl BlueskyClient {
    /// Create a client for `service` (e.g. `https://bsky.social`). No network
    /// traffic happens until `authenticate`.
    pub fn new(service: &str, identifier: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: service.trim_end_matches('/').to_string(),
            identifier: identifier.trim_start_matches('@').to_string(),
            password: password.to_string(),
            auth: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> Result<(String, String)> {
        let auth = self.auth.read().await;
        let auth = auth.as_ref().context("Bluesky client is not authenticated")?;
        Ok((auth.access_jwt.clone(), auth.session.did.clone()))
    }

    /// GET an XRPC query and deserialize the response.
    pub async fn xrpc_get<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/xrpc/{}", self.base_url, nsid);

        debug!(nsid = nsid, "XRPC GET request");

        let mut request = self.client.get(&url).query(params);
        if let Some(auth) = self.auth.read().await.as_ref() {
            request = request.bearer_auth(&auth.access_jwt);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("XRPC request failed: {nsid}"))?;

        read_json(nsid, response).await
    }

    /// POST a JSON body to an XRPC procedure and deserialize the response.
    async fn xrpc_post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        nsid: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T> {
        let url = format!("{}/xrpc/{}", self.base_url, nsid);

        debug!(nsid = nsid, "XRPC POST request");

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("XRPC request failed: {nsid}"))?;

        read_json(nsid, response).await
    }

    /// Resolve a handle to its DID.
    pub async fn resolve_handle(&self, handle: &str) -> Result<String> {
        let output: resolve_handle::Output = self
            .xrpc_get("com.atproto.identity.resolveHandle", &[("handle", handle)])
            .await
            .with_context(|| format!("Failed to resolve handle @{handle}"))?;
        Ok(output.did.as_str().to_string())
    }
}

async fn read_json<T: DeserializeOwned>(nsid: &str, response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("XRPC {nsid} returned {status}: {body}");
    }

    response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to deserialize {nsid} response"))
}

#[async_trait]
impl DestinationClient for BlueskyClient {
    async fn authenticate(&self) -> Result<Session> {
        let body = CreateSessionRequest {
            identifier: &self.identifier,
            password: &self.password,
        };
        let output: create_session::Output = self
            .xrpc_post("com.atproto.server.createSession", &body, None)
            .await
            .context("Failed to create Bluesky session")?;

        let session = Session {
            did: output.did.as_str().to_string(),
            handle: output.handle.as_str().to_string(),
        };
        info!(handle = session.handle, did = session.did, "Authenticated with Bluesky");

        *self.auth.write().await = Some(AuthSession {
            session: session.clone(),
            access_jwt: output.access_jwt.clone(),
        });
        Ok(session)
    }

    async fn tokenize_rich_text(&self, text: &str) -> Result<(String, Vec<Facet>)> {
        let mut facets = Vec::new();

        for detected in detect_facets(text) {
            let feature = match detected.kind {
                DetectedKind::Link(uri) => FacetFeature::Link { uri },
                DetectedKind::Tag(tag) => FacetFeature::Tag { tag },
                // An unknown handle stays plain text rather than failing the post.
                DetectedKind::Mention(handle) => match self.resolve_handle(&handle).await {
                    Ok(did) => FacetFeature::Mention { did },
                    Err(e) => {
                        debug!(handle = handle, error = %e, "Mention not resolvable, leaving as text");
                        continue;
                    }
                },
            };
            facets.push(Facet {
                index: detected.index,
                features: vec![feature],
            });
        }

        Ok((text.to_string(), facets))
    }

    async fn upload_image(&self, data: &[u8]) -> Result<BlobRef> {
        let (token, _) = self.access_token().await?;
        let url = format!("{}/xrpc/com.atproto.repo.uploadBlob", self.base_url);
        let mime = sniff_image_mime(data);

        debug!(bytes = data.len(), mime = mime, "Uploading image blob");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(data.to_vec())
            .send()
            .await
            .context("XRPC request failed: com.atproto.repo.uploadBlob")?;

        let output: UploadBlobResponse = read_json("com.atproto.repo.uploadBlob", response).await?;
        Ok(BlobRef(output.blob))
    }

    async fn create_post(&self, post: &DestinationPostRequest) -> Result<PostRef> {
        let (token, did) = self.access_token().await?;
        let body = CreateRecordRequest {
            repo: &did,
            collection: POST_COLLECTION,
            record: PostRecord::from_request(post),
        };

        let output: CreateRecordResponse = self
            .xrpc_post("com.atproto.repo.createRecord", &body, Some(&token))
            .await
            .context("Failed to create Bluesky post")?;

        debug!(uri = output.uri, "Created post");
        Ok(PostRef {
            uri: output.uri,
            cid: output.cid,
        })
    }
}

/// Guess an image MIME type from its magic bytes. Defaults to JPEG.
pub fn sniff_image_mime(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

// -- Serde types for XRPC requests and responses --

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: serde_json::Value,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: PostRecord,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
    cid: String,
}

/// An `app.bsky.feed.post` record as written to the repo.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: &'static str,
    pub text: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<ImagesEmbedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<String>,
}

/// An `app.bsky.embed.images` embed.
#[derive(Debug, Clone, Serialize)]
pub struct ImagesEmbedRecord {
    #[serde(rename = "$type")]
    pub embed_type: &'static str,
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub image: BlobRef,
    /// The lexicon requires `alt`, so a missing description is sent empty.
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl PostRecord {
    pub fn from_request(post: &DestinationPostRequest) -> Self {
        Self {
            record_type: POST_COLLECTION,
            text: post.text.clone(),
            created_at: post.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            facets: post.facets.clone(),
            embed: post.embed.as_ref().map(|embed| ImagesEmbedRecord {
                embed_type: "app.bsky.embed.images",
                images: embed
                    .images
                    .iter()
                    .map(|img| ImageRecord {
                        image: img.image.clone(),
                        alt: img.alt.clone().unwrap_or_default(),
                        aspect_ratio: img.aspect_ratio,
                    })
                    .collect(),
            }),
            reply: post.reply.clone(),
            langs: post.langs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ByteSlice, EmbedImage, ImageEmbed};
    use chrono::{TimeZone, Utc};

    fn request() -> DestinationPostRequest {
        DestinationPostRequest {
            text: "[1/2] hello #rust...".to_string(),
            created_at: Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap(),
            facets: vec![Facet {
                index: ByteSlice {
                    byte_start: 12,
                    byte_end: 17,
                },
                features: vec![FacetFeature::Tag {
                    tag: "rust".to_string(),
                }],
            }],
            embed: Some(ImageEmbed {
                images: vec![EmbedImage {
                    image: BlobRef(serde_json::json!({"$type": "blob", "ref": {"$link": "bafk"}})),
                    alt: None,
                    aspect_ratio: Some(AspectRatio {
                        width: 4,
                        height: 3,
                    }),
                }],
            }),
            reply: None,
            langs: vec!["en".to_string()],
        }
    }

    #[test]
    fn test_post_record_wire_format() {
        let json = serde_json::to_value(PostRecord::from_request(&request())).unwrap();
        assert_eq!(json["$type"], "app.bsky.feed.post");
        assert_eq!(json["createdAt"], "2023-04-05T06:07:08.000Z");
        assert_eq!(json["facets"][0]["index"]["byteStart"], 12);
        assert_eq!(
            json["facets"][0]["features"][0]["$type"],
            "app.bsky.richtext.facet#tag"
        );
        assert_eq!(json["embed"]["$type"], "app.bsky.embed.images");
        assert_eq!(json["embed"]["images"][0]["alt"], "");
        assert_eq!(json["embed"]["images"][0]["aspectRatio"]["width"], 4);
        assert_eq!(json["embed"]["images"][0]["image"]["ref"]["$link"], "bafk");
        assert_eq!(json["langs"][0], "en");
        assert!(json.get("reply").is_none());
    }

    #[test]
    fn test_post_record_reply_and_empty_fields() {
        let mut req = request();
        req.facets.clear();
        req.embed = None;
        req.langs.clear();
        let root = PostRef {
            uri: "at://did:plc:me/app.bsky.feed.post/1".into(),
            cid: "cid1".into(),
        };
        req.reply = Some(ReplyRef {
            root: root.clone(),
            parent: root,
        });
        let json = serde_json::to_value(PostRecord::from_request(&req)).unwrap();
        assert!(json.get("facets").is_none());
        assert!(json.get("embed").is_none());
        assert!(json.get("langs").is_none());
        assert_eq!(json["reply"]["root"]["cid"], "cid1");
        assert_eq!(json["reply"]["parent"]["uri"], "at://did:plc:me/app.bsky.feed.post/1");
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_image_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_image_mime(b"??"), "image/jpeg");
    }

    #[test]
    fn test_create_record_response_deserializes() {
        let json = r#"{"uri": "at://did:plc:x/app.bsky.feed.post/3k", "cid": "bafyrei", "commit": {"cid": "c", "rev": "r"}}"#;
        let resp: CreateRecordResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.uri, "at://did:plc:x/app.bsky.feed.post/3k");
        assert_eq!(resp.cid, "bafyrei");
    }

    #[tokio::test]
    async fn test_create_post_requires_session() {
        let client = BlueskyClient::new("https://bsky.example", "me.bsky.social", "pw").unwrap();
        let err = client.create_post(&request()).await.unwrap_err();
        assert!(err.to_string().contains("not authenticated"));
    }
}

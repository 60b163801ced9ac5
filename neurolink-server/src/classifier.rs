//! Emotion classifier port and adapters
//!
//! The classifier is an external black box: given a frame it returns the
//! dominant emotion, a per-emotion score distribution and an optional face
//! box. Any failure means "no detection this frame".

use async_trait::async_trait;
use neurolink_common::{Error, FaceRegion, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::frames::DecodedFrame;

/// Raw classifier output for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub dominant_emotion: String,
    /// Score per emotion on a 0-100 scale
    pub scores: HashMap<String, f64>,
    pub face_region: Option<FaceRegion>,
}

impl RawDetection {
    /// Score of the dominant emotion, 0 when the distribution omits it
    pub fn dominant_score(&self) -> f64 {
        self.scores
            .get(&self.dominant_emotion)
            .copied()
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
    }
}

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, frame: &DecodedFrame) -> Result<RawDetection>;
}

/// Used when no classifier service is configured; every frame is dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableClassifier;

#[async_trait]
impl EmotionClassifier for UnavailableClassifier {
    async fn classify(&self, _frame: &DecodedFrame) -> Result<RawDetection> {
        Err(Error::Classifier("no classifier configured".to_string()))
    }
}

/// Client for a DeepFace-compatible `POST /analyze` endpoint
#[derive(Debug, Clone)]
pub struct DeepFaceHttpClassifier {
    client: reqwest::Client,
    analyze_url: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    img: &'a str,
    actions: [&'static str; 1],
    enforce_detection: bool,
    silent: bool,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRegion {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    w: f64,
    #[serde(default)]
    h: f64,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    dominant_emotion: String,
    #[serde(default)]
    emotion: HashMap<String, f64>,
    region: Option<AnalyzeRegion>,
}

/// DeepFace versions differ in how they wrap results
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnalyzeResponse {
    Wrapped { results: Vec<AnalyzeResult> },
    List(Vec<AnalyzeResult>),
    Single(AnalyzeResult),
}

impl DeepFaceHttpClassifier {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:5005`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build classifier client: {}", e)))?;

        Ok(Self {
            client,
            analyze_url: format!("{}/analyze", base_url.trim_end_matches('/')),
        })
    }

    pub fn analyze_url(&self) -> &str {
        &self.analyze_url
    }
}

/// Map a DeepFace `/analyze` response body to a [`RawDetection`]
pub fn parse_analyze_response(body: serde_json::Value) -> Result<RawDetection> {
    let response: AnalyzeResponse = serde_json::from_value(body)
        .map_err(|e| Error::Classifier(format!("unexpected analyze response: {}", e)))?;

    let first = match response {
        AnalyzeResponse::Wrapped { results } | AnalyzeResponse::List(results) => {
            results.into_iter().next()
        }
        AnalyzeResponse::Single(result) => Some(result),
    }
    .ok_or_else(|| Error::Classifier("analyze response contained no results".to_string()))?;

    let face_region = first
        .region
        .map(|r| FaceRegion::new(r.x as i32, r.y as i32, r.w as i32, r.h as i32));

    Ok(RawDetection {
        dominant_emotion: first.dominant_emotion.to_lowercase(),
        scores: first
            .emotion
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect(),
        face_region,
    })
}

#[async_trait]
impl EmotionClassifier for DeepFaceHttpClassifier {
    async fn classify(&self, frame: &DecodedFrame) -> Result<RawDetection> {
        let img = frame.to_data_uri();
        let request = AnalyzeRequest {
            img: &img,
            actions: ["emotion"],
            enforce_detection: false,
            silent: true,
        };

        let response = self
            .client
            .post(&self.analyze_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Classifier(format!("analyze request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Classifier(format!("analyze returned HTTP {}", status)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Classifier(format!("analyze response unreadable: {}", e)))?;

        let detection = parse_analyze_response(body)?;
        debug!(
            "Classified {}x{} frame as {} ({:.1})",
            frame.width,
            frame.height,
            detection.dominant_emotion,
            detection.dominant_score()
        );
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_response() {
        let body = json!({
            "results": [{
                "dominant_emotion": "happy",
                "emotion": {"happy": 90.5, "sad": 2.0, "neutral": 7.5},
                "region": {"x": 10, "y": 12, "w": 50, "h": 55, "left_eye": null}
            }]
        });
        let detection = parse_analyze_response(body).unwrap();
        assert_eq!(detection.dominant_emotion, "happy");
        assert_eq!(detection.dominant_score(), 90.5);
        assert_eq!(detection.face_region, Some(FaceRegion::new(10, 12, 50, 55)));
    }

    #[test]
    fn test_parse_bare_list_and_single() {
        let list = json!([{ "dominant_emotion": "Sad", "emotion": {"Sad": 60.0} }]);
        let detection = parse_analyze_response(list).unwrap();
        assert_eq!(detection.dominant_emotion, "sad");
        assert_eq!(detection.dominant_score(), 60.0);
        assert_eq!(detection.face_region, None);

        let single = json!({ "dominant_emotion": "fear", "emotion": {} });
        let detection = parse_analyze_response(single).unwrap();
        assert_eq!(detection.dominant_score(), 0.0);
    }

    #[test]
    fn test_parse_rejects_empty_or_malformed() {
        assert!(parse_analyze_response(json!({ "results": [] })).is_err());
        assert!(parse_analyze_response(json!({ "error": "Face could not be detected" })).is_err());
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(AnalyzeRequest {
            img: "data:image/png;base64,AAAA",
            actions: ["emotion"],
            enforce_detection: false,
            silent: true,
        })
        .unwrap();
        assert_eq!(body["actions"], json!(["emotion"]));
        assert_eq!(body["enforce_detection"], false);
        assert_eq!(body["img"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_analyze_url_normalized() {
        let c = DeepFaceHttpClassifier::new("http://localhost:5005/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.analyze_url(), "http://localhost:5005/analyze");
    }

    #[tokio::test]
    async fn test_unavailable_classifier_always_fails() {
        let frame = crate::frames::decode_data_uri(
            &crate::frames::tests::png_data_uri(4, 4),
            usize::MAX,
        )
        .unwrap();
        assert!(UnavailableClassifier.classify(&frame).await.is_err());
    }
}

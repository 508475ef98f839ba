//! HTML report of an analysis.

use tumorcam_core::LabelSet;
use tumorcam_transforms::data_uri;

use crate::error::Result;
use crate::pipeline::Analysis;

/// Inline images of a Grad-CAM explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationImages {
    /// The upload resized to the display size.
    pub resized_uri: String,
    /// The heatmap overlay.
    pub overlay_uri: String,
}

/// Rendered result for one image: label, confidence and inline images.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    label: String,
    confidence: String,
    probabilities: Vec<(String, f32)>,
    image_uri: String,
    explanation: Option<ExplanationImages>,
}

impl Report {
    /// Encode the images of an analysis.
    ///
    /// # Errors
    ///
    /// Returns an error if an image cannot be encoded.
    pub fn from_analysis(analysis: &Analysis, labels: &LabelSet, jpeg_quality: u8) -> Result<Self> {
        let prediction = &analysis.prediction;
        let explanation = match &analysis.saliency {
            Some(saliency) => Some(ExplanationImages {
                resized_uri: data_uri(saliency.resized(), jpeg_quality)?,
                overlay_uri: data_uri(saliency.overlay(), jpeg_quality)?,
            }),
            None => None,
        };

        Ok(Self {
            label: prediction.label().to_string(),
            confidence: prediction.confidence_percent(),
            probabilities: prediction
                .ranked(labels)
                .into_iter()
                .map(|(label, p)| (label.to_string(), p))
                .collect(),
            image_uri: data_uri(&analysis.image, jpeg_quality)?,
            explanation,
        })
    }

    /// Predicted label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Confidence as a percentage with two decimals, e.g. `97.31%`.
    pub fn confidence(&self) -> &str {
        &self.confidence
    }

    /// Class probabilities, most likely first.
    pub fn probabilities(&self) -> &[(String, f32)] {
        &self.probabilities
    }

    /// `data:` URI of the uploaded image.
    pub fn image_uri(&self) -> &str {
        &self.image_uri
    }

    /// Explanation images, if the analysis included one.
    pub fn explanation(&self) -> Option<&ExplanationImages> {
        self.explanation.as_ref()
    }

    /// Render as a self-contained HTML fragment.
    pub fn to_html(&self) -> String {
        let rows: String = self
            .probabilities
            .iter()
            .map(|(label, p)| {
                format!(
                    "    <tr><td>{}</td><td>{:.2}%</td></tr>\n",
                    escape_html(label),
                    p * 100.0
                )
            })
            .collect();

        let gradcam = self
            .explanation
            .as_ref()
            .map(|images| {
                format!(
                    concat!(
                        "  <div class=\"gradcam\">\n",
                        "    <figure><img src=\"{}\" alt=\"Original\"><figcaption>Original</figcaption></figure>\n",
                        "    <figure><img src=\"{}\" alt=\"Grad-CAM\"><figcaption>Grad-CAM</figcaption></figure>\n",
                        "  </div>\n",
                    ),
                    images.resized_uri, images.overlay_uri
                )
            })
            .unwrap_or_default();

        format!(
            concat!(
                "<div class=\"tumorcam-report\">\n",
                "  <img class=\"upload\" src=\"{}\" alt=\"Uploaded image\">\n",
                "  <p class=\"prediction\">Prediction: <strong>{}</strong></p>\n",
                "  <p class=\"confidence\">Confidence: {}</p>\n",
                "  <table class=\"probabilities\">\n",
                "{}",
                "  </table>\n",
                "{}",
                "</div>\n",
            ),
            self.image_uri,
            escape_html(&self.label),
            escape_html(&self.confidence),
            rows,
            gradcam
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

//! Harvest prompt templates and response hygiene.

use sha2::{Digest, Sha256};

use crate::types::SiteRecord;

/// Settings key under which an operator can override the system prompt.
pub const HARVEST_PROMPT_SETTING: &str = "harvest_system_prompt";

/// Built-in system prompt, used when no override is stored.
///
/// Describes the exact envelope the import pipeline accepts; changing a
/// key here breaks harvests, so the shape is spelled out field by field.
pub const DEFAULT_HARVEST_PROMPT: &str = r#"You inventory the documents published by a heritage archive site.

Answer with a single JSON object and nothing else: no prose, no markdown fences. The object has exactly this shape:

{
  "documents": [
    {
      "url_doc": "https://ville.example.org/bulletins/bulletin-42.pdf",
      "document_name": "Bulletin municipal n°42",
      "filename": "bulletin-42.pdf",
      "date_edition": "1987-03",
      "auteurs": "Commission des archives",
      "langue": "fr",
      "resume": "One or two sentences describing the content",
      "statut": "disponible",
      "issue_number": "42",
      "annee": 1987,
      "format": "PDF",
      "type_document": "bulletin",
      "contient_texte": true,
      "pattern_verified": false,
      "notes": "",
      "obstacles": "",
      "source_page": "https://ville.example.org/archives"
    }
  ],
  "logs": [
    {
      "level": "info",
      "message": "What happened, for the operator",
      "timestamp": "2026-08-25T14:03:00Z",
      "url": "https://ville.example.org/archives",
      "details": {}
    }
  ],
  "obstacles-globaux": ["Site-wide access problems, e.g. a captcha"],
  "recommandations": "Advice for the next harvest run"
}

Rules:
- url_doc is required for every document and must be an absolute URL.
- Never list the same url_doc twice.
- Use empty strings for text fields you cannot determine; never invent values.
- annee is the publication year as an integer.
- contient_texte is true only when the document has a machine-readable text layer.
- log level is one of "error", "warning", "info".
- Leave "obstacles-globaux" empty and omit "recommandations" when there is nothing to report."#;

const HARVEST_USER_PROMPT: &str = r#"Harvest the following site.

Site: {name}
URL: {url}

Operator instructions:
{instructions}

Known obstacles from previous runs:
{obstacles}

Answer with the JSON object only."#;

/// Render the per-site user prompt.
pub fn format_harvest_prompt(site: &SiteRecord) -> String {
    let instructions = if site.harvest_instructions.trim().is_empty() {
        "(none)".to_string()
    } else {
        site.harvest_instructions.trim().to_string()
    };
    let obstacles = if site.obstacles_globaux.is_empty() {
        "(none)".to_string()
    } else {
        site.obstacles_globaux
            .iter()
            .map(|obstacle| format!("- {obstacle}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    HARVEST_USER_PROMPT
        .replace("{name}", &site.name)
        .replace("{url}", &site.url)
        .replace("{instructions}", &instructions)
        .replace("{obstacles}", &obstacles)
}

/// Hash of the built-in prompt, logged so prompt revisions are traceable.
pub fn harvest_prompt_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(DEFAULT_HARVEST_PROMPT.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Strip the markdown code fences models wrap JSON in.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_names_every_wire_field() {
        for field in [
            "url_doc",
            "document_name",
            "filename",
            "date_edition",
            "auteurs",
            "langue",
            "resume",
            "statut",
            "issue_number",
            "annee",
            "format",
            "type_document",
            "contient_texte",
            "pattern_verified",
            "notes",
            "obstacles",
            "source_page",
            "obstacles-globaux",
            "recommandations",
        ] {
            assert!(
                DEFAULT_HARVEST_PROMPT.contains(field),
                "prompt must describe {field}"
            );
        }
    }

    #[test]
    fn user_prompt_substitutes_site_fields() {
        let site = SiteRecord::new("Ville d'Exemple", "https://ville.example.org")
            .with_instructions("Ne pas suivre les liens externes.");
        let prompt = format_harvest_prompt(&site);
        assert!(prompt.contains("Site: Ville d'Exemple"));
        assert!(prompt.contains("URL: https://ville.example.org"));
        assert!(prompt.contains("Ne pas suivre les liens externes."));
        assert!(prompt.contains("(none)"), "no obstacles recorded yet");
        assert!(!prompt.contains("{name}"));
    }

    #[test]
    fn user_prompt_lists_known_obstacles() {
        let mut site = SiteRecord::new("Ville", "https://ville.example.org");
        site.obstacles_globaux = vec!["captcha".to_string(), "robots.txt strict".to_string()];
        let prompt = format_harvest_prompt(&site);
        assert!(prompt.contains("- captcha"));
        assert!(prompt.contains("- robots.txt strict"));
    }

    #[test]
    fn prompt_hash_is_stable_hex() {
        let a = harvest_prompt_hash();
        let b = harvest_prompt_hash();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }
}

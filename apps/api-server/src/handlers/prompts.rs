//! Prompt templates and model-output parsing for the LLM-backed endpoints.

use serde::Deserialize;
use vitae_shared::dto::{CvStatistic, ExperienceText, Language};

/// Upper bound on statistic values accepted from the model.
const MAX_STATISTIC_VALUE: u32 = 1_000_000;

pub fn chat_system(language: Language, cv_context: &str) -> String {
    match language {
        Language::Fr => format!(
            "Tu es un assistant IA qui aide les visiteurs à en savoir plus sur le titulaire de ce CV \
             en répondant à leurs questions. Voici les informations du CV:\n\n{cv_context}\n\n\
             Réponds de manière professionnelle, concise et en français. IMPORTANT: Limite tes \
             réponses à un maximum de 75 mots. Si on te demande des informations qui ne sont pas \
             dans le CV, dis-le poliment. Pour un contact, réfère à la section \"Me contacter\" du CV."
        ),
        Language::En => format!(
            "You are an AI assistant helping visitors learn more about the owner of this resume by \
             answering their questions. Here is the resume information:\n\n{cv_context}\n\n\
             Respond in a professional, concise manner in English. IMPORTANT: Limit your responses \
             to a maximum of 75 words. If asked for information not in the resume, politely say so. \
             For contact requests, refer to the \"Contact Me\" section of the resume."
        ),
    }
}

pub fn translate_system(target: Language) -> &'static str {
    match target {
        Language::Fr => {
            "Tu es un traducteur professionnel. Traduis les textes de l'anglais vers le français de \
             manière professionnelle et naturelle. Conserve le ton professionnel et le contexte d'un \
             CV. Retourne uniquement la traduction, sans commentaires additionnels."
        }
        Language::En => {
            "You are a professional translator. Translate texts from French to English in a \
             professional and natural manner. Maintain the professional tone and CV context. \
             Return only the translation, without additional comments."
        }
    }
}

pub fn translate_user(text: &ExperienceText, target: Language, context: Option<&str>) -> String {
    let target_name = match target {
        Language::Fr => "français",
        Language::En => "anglais",
    };
    let mut prompt = format!(
        "Traduis les éléments suivants d'une expérience professionnelle en {target_name}:\n\n\
         Titre du poste: {}\nEntreprise: {}\nDescription: {}\n\n",
        text.titre, text.entreprise, text.description
    );
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Contexte additionnel: {context}\n\n"));
    }
    prompt.push_str(
        "Retourne la traduction au format JSON avec les clés: titre, entreprise, description.",
    );
    prompt
}

pub fn suggest_tags_system(language: Language) -> &'static str {
    match language {
        Language::Fr => {
            "Tu proposes des mots-clés pour une expérience de CV. Retourne UNIQUEMENT un tableau \
             JSON de 3 à 8 mots-clés courts (technologies, domaines, compétences), sans texte autour."
        }
        Language::En => {
            "You suggest keywords for a resume experience. Return ONLY a JSON array of 3 to 8 \
             short tags (technologies, domains, skills), with no surrounding text."
        }
    }
}

pub fn suggest_tags_user(title: &str, description: &str) -> String {
    format!("Title: {title}\nDescription: {description}")
}

pub fn fit_system(language: Language) -> String {
    let answer_in = match language {
        Language::Fr => "français",
        Language::En => "anglais",
    };
    format!(
        "Tu es un expert en recrutement et analyse de CV.\n\n\
         TÂCHE: Analyser la compatibilité entre ce CV et une description de poste, pour un \
         employeur qui évalue ce candidat.\n\n\
         RÈGLES:\n\
         - Score global de 0 à 100, réaliste et honnête\n\
         - 3-5 points \"strongFit\"\n\
         - 2-4 points \"areasForDevelopment\"\n\
         - 2-3 recommandations pour le recruteur\n\
         - Un résumé de 30-50 mots pour les forces et pour le développement\n\
         - Réponds en {answer_in}\n\n\
         Réponds UNIQUEMENT avec du JSON valide, sans balises markdown:\n\
         {{\"overallScore\": 75, \"strongFit\": [\"...\"], \"areasForDevelopment\": [\"...\"], \
         \"recommendations\": [\"...\"], \"strongFitSummary\": \"...\", \"developmentSummary\": \"...\"}}"
    )
}

pub fn fit_user(cv_context: &str, job_description: &str) -> String {
    format!("CV:\n{cv_context}\n\nDESCRIPTION DE POSTE:\n{job_description}")
}

pub const STATISTICS_SYSTEM: &str = "Tu es un expert en analyse de CV qui génère des statistiques \
    impressionnantes et factuelles.\n\
    RÈGLES:\n\
    1. Génère EXACTEMENT 3 statistiques basées sur les données réelles du CV\n\
    2. Chaque statistique a un label français (statN_fr), anglais (statN_en) et une valeur entière (statN_value)\n\
    3. Labels courts (30 caractères maximum)\n\
    FORMAT (JSON pur, sans markdown):\n\
    {\"stat1_fr\": \"Années d'expérience\", \"stat1_en\": \"Years of experience\", \"stat1_value\": 15, \
    \"stat2_fr\": \"...\", \"stat2_en\": \"...\", \"stat2_value\": 42, \
    \"stat3_fr\": \"...\", \"stat3_en\": \"...\", \"stat3_value\": 120}";

pub fn statistics_user(cv_context: &str) -> String {
    format!("Génère 3 statistiques impressionnantes pour ce CV:\n\n{cv_context}")
}

/// Strip markdown fences and keep the outermost `open`..`close` span.
fn extract_delimited(text: &str, open: char, close: char) -> &str {
    let trimmed = text.trim();
    match (trimmed.find(open), trimmed.rfind(close)) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// JSON object embedded in model output.
pub fn extract_json_object(text: &str) -> &str {
    extract_delimited(text, '{', '}')
}

/// JSON array embedded in model output.
pub fn extract_json_array(text: &str) -> &str {
    extract_delimited(text, '[', ']')
}

#[derive(Deserialize)]
struct RawStatistics {
    stat1_fr: String,
    stat1_en: String,
    stat1_value: u32,
    stat2_fr: String,
    stat2_en: String,
    stat2_value: u32,
    stat3_fr: String,
    stat3_en: String,
    stat3_value: u32,
}

/// Parse the three labelled figures; `None` when any is missing or implausible.
pub fn parse_statistics(text: &str) -> Option<Vec<CvStatistic>> {
    let raw: RawStatistics = serde_json::from_str(extract_json_object(text)).ok()?;
    let stats = vec![
        (raw.stat1_fr, raw.stat1_en, raw.stat1_value),
        (raw.stat2_fr, raw.stat2_en, raw.stat2_value),
        (raw.stat3_fr, raw.stat3_en, raw.stat3_value),
    ];

    stats
        .into_iter()
        .map(|(label_fr, label_en, value)| {
            let valid = !label_fr.trim().is_empty()
                && !label_en.trim().is_empty()
                && value <= MAX_STATISTIC_VALUE;
            valid.then_some(CvStatistic {
                label_fr,
                label_en,
                value,
            })
        })
        .collect()
}

/// Normalize suggested tags: trimmed, non-empty, deduplicated case-insensitively.
pub fn parse_tags(text: &str) -> Option<Vec<String>> {
    let raw: Vec<String> = serde_json::from_str(extract_json_array(text)).ok()?;
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    }
    Some(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_fenced_output() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(text), "{\"a\": 1}");
        assert_eq!(extract_json_object("Sure! {\"a\": {\"b\": 2}} done"), "{\"a\": {\"b\": 2}}");
        assert_eq!(extract_json_object("no json"), "no json");
    }

    #[test]
    fn statistics_need_all_three() {
        let ok = r#"{"stat1_fr":"Années","stat1_en":"Years","stat1_value":15,
            "stat2_fr":"Outils","stat2_en":"Tools","stat2_value":42,
            "stat3_fr":"Projets","stat3_en":"Projects","stat3_value":120}"#;
        let stats = parse_statistics(ok).unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[1].label_en, "Tools");

        assert!(parse_statistics(r#"{"stat1_fr":"x","stat1_en":"y","stat1_value":1}"#).is_none());
        assert!(parse_statistics(&ok.replace("15", "2000000")).is_none());
        assert!(parse_statistics(&ok.replace("\"Outils\"", "\" \"")).is_none());
    }

    #[test]
    fn tags_are_deduplicated() {
        let tags = parse_tags("Here you go: [\"Rust\", \" rust \", \"\", \"Tokio\"]").unwrap();
        assert_eq!(tags, vec!["Rust".to_string(), "Tokio".to_string()]);
    }

    #[test]
    fn chat_prompt_caps_length() {
        assert!(chat_system(Language::En, "cv").contains("75 words"));
        assert!(chat_system(Language::Fr, "cv").contains("75 mots"));
    }

    #[test]
    fn translate_prompt_skips_blank_context() {
        let text = ExperienceText {
            titre: "Dev".to_string(),
            ..Default::default()
        };
        assert!(!translate_user(&text, Language::En, Some("  ")).contains("Contexte"));
        assert!(translate_user(&text, Language::En, Some("fintech")).contains("fintech"));
    }
}

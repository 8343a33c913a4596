//! 题目生成服务 - 业务能力层
//!
//! 让文本生成模型出一道指定语言的题目，校验文字系统，失败时重试，
//! 重试耗尽后返回写死的兜底题目。生成失败永远不会传给调用方。

use std::sync::Arc;

use phf::phf_map;
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::infrastructure::TextGenerator;
use crate::models::{GeneratedQuestion, Language, Script};
use crate::services::json_extract::{extract_json, object_candidates};
use crate::services::script::{script_conformance, script_stats};

const SYSTEM_MESSAGE: &str = "You write short, open-ended survey questions that native speakers \
    can answer in a few sentences. You always reply with exactly one JSON object and nothing else.";

/// 兜底题目：语言 → (分类, 本族文字题目, 拉丁转写题目)
static FALLBACK_QUESTIONS: phf::Map<&'static str, (&'static str, &'static str, &'static str)> = phf_map! {
    "Santali" => ("introduction", "ᱟᱢᱟᱜ ᱧᱩᱛᱩᱢ ᱫᱚ ᱪᱮᱫ ᱠᱟᱱᱟ?", "Amag nutum do ced kana?"),
    "Hindi" => ("festivals", "आपका पसंदीदा त्योहार कौन सा है और क्यों?", "Aapka pasandida tyohaar kaun sa hai aur kyon?"),
    "Bengali" => ("food", "আপনার প্রিয় খাবার কী এবং কেন?", "Apnar priyo khabar ki ebong keno?"),
    "Odia" => ("food", "ଆପଣଙ୍କ ପ୍ରିୟ ଖାଦ୍ୟ କଣ ଏବଂ କାହିଁକି?", "Apananka priya khadya kana ebam kahinki?"),
};

const GENERIC_FALLBACK: (&str, &str) = ("daily_life", "Describe a typical day in your village.");

/// 一次生成的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub question: GeneratedQuestion,
    /// 实际调用模型的次数
    pub attempts: usize,
    /// 是否使用了兜底题目
    pub fallback: bool,
}

/// 题目生成服务
pub struct QuestionGenerator {
    generator: Arc<dyn TextGenerator>,
    retry_budget: usize,
    script_threshold: f64,
}

impl QuestionGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, retry_budget: usize, script_threshold: f64) -> Self {
        Self {
            generator,
            retry_budget: retry_budget.max(1),
            script_threshold,
        }
    }

    /// 生成一道题目
    ///
    /// 每次失败（调用失败、JSON 不合法、缺字段、文字不符）都消耗一次尝试机会。
    pub async fn generate(
        &self,
        language: Language,
        script: Script,
        topic_hint: Option<&str>,
    ) -> GenerationOutcome {
        let prompt = build_prompt(language, script, topic_hint);

        for attempt in 1..=self.retry_budget {
            match self.try_generate_once(&prompt, language, script).await {
                Ok(question) => {
                    debug!("第 {} 次尝试生成成功: {}", attempt, question.question);
                    return GenerationOutcome {
                        question,
                        attempts: attempt,
                        fallback: false,
                    };
                }
                Err(e) => {
                    warn!(
                        "生成 {} 题目失败 (尝试 {}/{}): {}",
                        language, attempt, self.retry_budget, e
                    );
                }
            }
        }

        info!("⚠️ {} 题目生成重试耗尽，使用兜底题目", language);
        GenerationOutcome {
            question: fallback_question(language, script),
            attempts: self.retry_budget,
            fallback: true,
        }
    }

    async fn try_generate_once(
        &self,
        prompt: &str,
        language: Language,
        script: Script,
    ) -> Result<GeneratedQuestion, LlmError> {
        let response = self.generator.complete(prompt, Some(SYSTEM_MESSAGE)).await?;
        let question = parse_generated(&response)?;

        if script == Script::Native {
            let range = language.script_range();
            let stats = script_stats(&question.question, &range);
            if stats.in_range == 0 || !script_conformance(&question.question, &range, self.script_threshold) {
                return Err(LlmError::ScriptMismatch {
                    language,
                    text: question.question,
                });
            }
        }
        Ok(question)
    }
}

/// 构建出题提示词
pub fn build_prompt(language: Language, script: Script, topic_hint: Option<&str>) -> String {
    let topic = match topic_hint.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => format!("The question must be about: {}.", topic),
        None => "Pick an everyday topic such as family, food, festivals, farming, weather or village life.".to_string(),
    };

    let script_rule = match script {
        Script::Native => format!(
            "Write the question strictly in {} script ({}). Do not use Latin letters or any other script.",
            language.script_name(),
            language.script_native_label()
        ),
        Script::Latin => format!(
            "Write the question in {} transliterated into the Latin alphabet.",
            language.name()
        ),
    };

    format!(
        r#"Create ONE simple, open-ended question in the {language} language for a community language dataset.
{topic}
{script_rule}
Respond with only this JSON object:
{{"category": "<short English topic label>", "question": "<the question>"}}"#,
        language = language.name(),
        topic = topic,
        script_rule = script_rule,
    )
}

/// 解析模型输出
///
/// 先提取 JSON 对象；第一个对象解析失败时继续尝试后面的对象。
/// 再做严格校验：字段缺失或为空都视为失败。
pub fn parse_generated(response: &str) -> Result<GeneratedQuestion, LlmError> {
    let first = extract_json(response);
    let parsed = match serde_json::from_str::<GeneratedQuestion>(first) {
        Ok(parsed) => parsed,
        Err(source) => object_candidates(response)
            .filter(|candidate| *candidate != first)
            .find_map(|candidate| serde_json::from_str::<GeneratedQuestion>(candidate).ok())
            .ok_or_else(|| LlmError::MalformedJson {
                response: crate::utils::truncate_text(response, 200),
                source,
            })?,
    };

    let category = parsed.category.trim();
    let question = parsed.question.trim();
    if category.is_empty() {
        return Err(LlmError::MissingField {
            field: "category".to_string(),
        });
    }
    if question.is_empty() {
        return Err(LlmError::MissingField {
            field: "question".to_string(),
        });
    }

    Ok(GeneratedQuestion {
        category: category.to_string(),
        question: question.to_string(),
    })
}

/// 写死的兜底题目
pub fn fallback_question(language: Language, script: Script) -> GeneratedQuestion {
    let (category, question) = FALLBACK_QUESTIONS
        .get(language.name())
        .map(|(category, native, latin)| match script {
            Script::Native => (*category, *native),
            Script::Latin => (*category, *latin),
        })
        .unwrap_or(GENERIC_FALLBACK);

    GeneratedQuestion {
        category: category.to_string(),
        question: question.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::script::DEFAULT_SCRIPT_THRESHOLD;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 依次返回预设响应的模型桩，记录调用次数
    struct ScriptedGenerator {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        repeat_last: String,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn always(response: &str) -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                repeat_last: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn sequence(responses: Vec<Result<String, LlmError>>, then: &str) -> Self {
            Self {
                responses: Mutex::new(responses),
                repeat_last: then.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _user: &str, _system: Option<&str>) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(self.repeat_last.clone())
            } else {
                responses.remove(0)
            }
        }
    }

    fn generator(stub: Arc<ScriptedGenerator>) -> QuestionGenerator {
        QuestionGenerator::new(stub, 3, DEFAULT_SCRIPT_THRESHOLD)
    }

    #[tokio::test]
    async fn test_non_bengali_output_exhausts_budget_then_falls_back() {
        let stub = Arc::new(ScriptedGenerator::always(
            r#"{"category": "food", "question": "What is your favourite food?"}"#,
        ));
        let outcome = generator(stub.clone())
            .generate(Language::Bengali, Script::Native, None)
            .await;

        assert_eq!(stub.calls(), 3);
        assert!(outcome.fallback);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.question, fallback_question(Language::Bengali, Script::Native));
        assert!(script_conformance(
            &outcome.question.question,
            &Language::Bengali.script_range(),
            DEFAULT_SCRIPT_THRESHOLD
        ));
    }

    #[tokio::test]
    async fn test_recovers_after_malformed_and_failed_attempts() {
        let stub = Arc::new(ScriptedGenerator::sequence(
            vec![
                Ok("Sorry, I can't help with that.".to_string()),
                Err(LlmError::EmptyContent {
                    model: "scripted".to_string(),
                }),
            ],
            "Here you go:\n```json\n{\"category\": \"family\", \"q\": \"আপনার পরিবারে কে কে আছেন?\"}\n```",
        ));
        let outcome = generator(stub.clone())
            .generate(Language::Bengali, Script::Native, Some("family"))
            .await;

        assert_eq!(stub.calls(), 3);
        assert!(!outcome.fallback);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.question.category, "family");
        assert_eq!(outcome.question.question, "আপনার পরিবারে কে কে আছেন?");
    }

    #[tokio::test]
    async fn test_latin_script_skips_script_check() {
        let stub = Arc::new(ScriptedGenerator::always(
            r#"{"category": "weather", "question": "Aaj mausam kaisa hai?"}"#,
        ));
        let outcome = generator(stub.clone())
            .generate(Language::Hindi, Script::Latin, None)
            .await;

        assert_eq!(stub.calls(), 1);
        assert!(!outcome.fallback);
        assert_eq!(outcome.question.question, "Aaj mausam kaisa hai?");
    }

    #[tokio::test]
    async fn test_punctuation_only_question_is_rejected() {
        let stub = Arc::new(ScriptedGenerator::always(r#"{"category": "x", "question": "???"}"#));
        let outcome = generator(stub.clone())
            .generate(Language::Santali, Script::Native, None)
            .await;

        assert!(outcome.fallback);
        assert_eq!(stub.calls(), 3);
    }

    #[test]
    fn test_parse_generated_requires_both_fields() {
        assert!(matches!(
            parse_generated(r#"{"category": "food"}"#),
            Err(LlmError::MalformedJson { .. })
        ));
        assert!(matches!(
            parse_generated(r#"{"category": " ", "question": "x"}"#),
            Err(LlmError::MissingField { ref field }) if field == "category"
        ));
        assert!(matches!(
            parse_generated("no json at all"),
            Err(LlmError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_parse_skips_braces_in_leading_prose() {
        let response = "Here is the {format} you asked for: {\"category\": \"food\", \"question\": \"আপনার প্রিয় খাবার কী?\"}";
        let parsed = parse_generated(response).unwrap();
        assert_eq!(parsed.category, "food");
        assert_eq!(parsed.question, "আপনার প্রিয় খাবার কী?");
    }

    #[tokio::test]
    async fn test_braced_prose_does_not_cost_an_attempt() {
        let stub = Arc::new(ScriptedGenerator::always(
            "Use {category} and {question}:\n{\"category\": \"family\", \"question\": \"आपके परिवार में कौन है?\"}",
        ));
        let outcome = generator(stub.clone())
            .generate(Language::Hindi, Script::Native, None)
            .await;

        assert_eq!(stub.calls(), 1);
        assert!(!outcome.fallback);
        assert_eq!(outcome.question.category, "family");
    }

    #[test]
    fn test_prompt_enforces_native_script() {
        let prompt = build_prompt(Language::Santali, Script::Native, Some("farming"));
        assert!(prompt.contains("Santali"));
        assert!(prompt.contains("Ol Chiki"));
        assert!(prompt.contains("farming"));
        assert!(prompt.contains("\"category\""));

        let latin = build_prompt(Language::Odia, Script::Latin, None);
        assert!(latin.contains("Latin alphabet"));
        assert!(!latin.contains("strictly"));
    }

    #[test]
    fn test_every_native_fallback_conforms() {
        for language in Language::ALL {
            let fallback = fallback_question(language, Script::Native);
            let stats = script_stats(&fallback.question, &language.script_range());
            assert!(stats.in_range > 0, "{} fallback has no native characters", language);
            assert!(script_conformance(
                &fallback.question,
                &language.script_range(),
                DEFAULT_SCRIPT_THRESHOLD
            ));
        }
    }
}

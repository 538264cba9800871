use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError, Whitespace};

use crate::types::ReflectionId;
use crate::AccelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionHint {
    ConsiderReflections,
    ExcludeReflections,
    ChooseReflections,
    NoReflections,
}

impl ReflectionHint {
    pub const fn hint_name(self) -> &'static str {
        match self {
            Self::ConsiderReflections => "consider_reflections",
            Self::ExcludeReflections => "exclude_reflections",
            Self::ChooseReflections => "choose_reflections",
            Self::NoReflections => "no_reflections",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::ConsiderReflections,
            Self::ExcludeReflections,
            Self::ChooseReflections,
            Self::NoReflections,
        ]
        .into_iter()
        .find(|hint| hint.hint_name().eq_ignore_ascii_case(name))
    }
}

/// Reflection hints taken from the first `SELECT /*+ ... */` of a query that
/// carries any recognized hint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionHints {
    pub consider_reflections: BTreeSet<String>,
    pub exclude_reflections: BTreeSet<String>,
    pub choose_reflections: BTreeSet<String>,
    pub no_reflections: Option<bool>,
}

impl ReflectionHints {
    /// A query that does not tokenize is an invalid query; only a malformed
    /// hint body is an invalid hint.
    pub fn from_sql(sql: &str) -> Result<Self, AccelError> {
        let tokens = tokenize(sql).map_err(|err| AccelError::invalid_query(err.to_string()))?;
        let mut index = 0;
        while index < tokens.len() {
            if is_select(&tokens[index]) {
                if let Some(body) = hint_comment_after(&tokens[index + 1..]) {
                    let hints = parse_hint_body(body)?;
                    if !hints.is_empty() {
                        return Ok(hints);
                    }
                }
            }
            index += 1;
        }
        Ok(Self::default())
    }

    pub fn is_empty(&self) -> bool {
        self.consider_reflections.is_empty()
            && self.exclude_reflections.is_empty()
            && self.choose_reflections.is_empty()
            && self.no_reflections.is_none()
    }

    pub fn disables_reflections(&self) -> bool {
        self.no_reflections == Some(true)
    }

    pub fn allows(&self, reflection_id: &ReflectionId) -> bool {
        if self.disables_reflections() || self.exclude_reflections.contains(reflection_id.as_str()) {
            return false;
        }
        self.consider_reflections.is_empty()
            || self.consider_reflections.contains(reflection_id.as_str())
    }

    pub fn prefers(&self, reflection_id: &ReflectionId) -> bool {
        self.choose_reflections.contains(reflection_id.as_str())
    }

    fn apply(&mut self, hint: ReflectionHint, options: Vec<String>) {
        match hint {
            ReflectionHint::ConsiderReflections => self.consider_reflections.extend(options),
            ReflectionHint::ExcludeReflections => self.exclude_reflections.extend(options),
            ReflectionHint::ChooseReflections => self.choose_reflections.extend(options),
            ReflectionHint::NoReflections => {
                let disabled = !matches!(options.as_slice(), [only] if only.eq_ignore_ascii_case("false"));
                self.no_reflections = Some(disabled);
            }
        }
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>, TokenizerError> {
    Tokenizer::new(&GenericDialect {}, sql).tokenize()
}

fn is_select(token: &Token) -> bool {
    matches!(token, Token::Word(word) if word.keyword == Keyword::SELECT)
}

fn is_blank(token: &Token) -> bool {
    matches!(
        token,
        Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
    )
}

fn hint_comment_after(tokens: &[Token]) -> Option<&str> {
    let next = tokens.iter().find(|token| !is_blank(token))?;
    match next {
        Token::Whitespace(Whitespace::MultiLineComment(comment)) => comment.strip_prefix('+'),
        _ => None,
    }
}

fn parse_hint_body(body: &str) -> Result<ReflectionHints, AccelError> {
    let tokens: Vec<Token> = tokenize(body)
        .map_err(|err| AccelError::invalid_hint(format!("reflection hint: {err}")))?
        .into_iter()
        .filter(|token| !matches!(token, Token::Whitespace(_)))
        .collect();

    let mut hints = ReflectionHints::default();
    let mut index = 0;
    while index < tokens.len() {
        let Token::Word(word) = &tokens[index] else {
            index += 1;
            continue;
        };
        index += 1;

        let mut options = Vec::new();
        if matches!(tokens.get(index), Some(Token::LParen)) {
            index += 1;
            loop {
                match tokens.get(index) {
                    Some(Token::RParen) => {
                        index += 1;
                        break;
                    }
                    Some(token) => {
                        if let Some(option) = hint_option(token) {
                            options.push(option);
                        }
                        index += 1;
                    }
                    None => {
                        return Err(AccelError::invalid_hint(format!(
                            "unterminated options for hint `{}`",
                            word.value
                        )))
                    }
                }
            }
        }

        if let Some(hint) = ReflectionHint::from_name(&word.value) {
            hints.apply(hint, options);
        }
    }
    Ok(hints)
}

fn hint_option(token: &Token) -> Option<String> {
    match token {
        Token::SingleQuotedString(value) | Token::DoubleQuotedString(value) => Some(value.clone()),
        Token::Word(word) => Some(word.value.clone()),
        Token::Number(value, _) => Some(value.clone()),
        _ => None,
    }
}

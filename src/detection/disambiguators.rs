//! 按固定顺序运行的消歧策略
//!
//! 顺序：唯一候选、注入标注、唯一构造器、唯一静态工厂。
//! 第一个成功的策略胜出；某个策略报告错误时立即失败；
//! 全部忽略时把所有忽略原因按行拼接作为失败原因。

use super::{Candidate, InstantiationOptions};

/// 单个策略的结果
#[derive(Debug, Clone)]
pub enum Disambiguation {
    Success(Candidate),
    Ignore(String),
    Error(String),
}

pub trait Disambiguator {
    fn disambiguate(&self, options: &InstantiationOptions) -> Disambiguation;
}

struct SingleChoiceDisambiguator;

impl Disambiguator for SingleChoiceDisambiguator {
    fn disambiguate(&self, options: &InstantiationOptions) -> Disambiguation {
        match options.len() {
            0 => Disambiguation::Ignore("No public constructors or static factory methods found".to_string()),
            1 => match options.iter().next() {
                Some(candidate) => Disambiguation::Success(candidate.clone()),
                None => Disambiguation::Ignore("No public constructors or static factory methods found".to_string()),
            },
            _ => Disambiguation::Ignore("More than one public constructors or factory methods found".to_string()),
        }
    }
}

struct AnnotationDisambiguator;

impl Disambiguator for AnnotationDisambiguator {
    fn disambiguate(&self, options: &InstantiationOptions) -> Disambiguation {
        let marked: Vec<&Candidate> = options
            .iter()
            .filter(|candidate| candidate.is_marked_for_injection())
            .collect();
        match marked.as_slice() {
            [] => Disambiguation::Ignore("No annotations have been detected".to_string()),
            [candidate] => Disambiguation::Success((*candidate).clone()),
            _ => Disambiguation::Error(
                "More than one constructor or factory method has been annotated for injection".to_string(),
            ),
        }
    }
}

struct SingleConstructorDisambiguator;

impl Disambiguator for SingleConstructorDisambiguator {
    fn disambiguate(&self, options: &InstantiationOptions) -> Disambiguation {
        match options.constructors.as_slice() {
            [] => Disambiguation::Ignore("No public constructors found".to_string()),
            [constructor] => Disambiguation::Success(constructor.clone()),
            _ => Disambiguation::Ignore("More than one public constructors found".to_string()),
        }
    }
}

struct SingleStaticFactoryDisambiguator;

impl Disambiguator for SingleStaticFactoryDisambiguator {
    fn disambiguate(&self, options: &InstantiationOptions) -> Disambiguation {
        if !options.constructors.is_empty() {
            return Disambiguation::Ignore(
                "Static factories are not considered because public constructors have been found".to_string(),
            );
        }
        match options.static_factories.as_slice() {
            [] => Disambiguation::Ignore("No static factory methods have been found".to_string()),
            [factory] => Disambiguation::Success(factory.clone()),
            _ => Disambiguation::Ignore("More than one factory method has been found".to_string()),
        }
    }
}

const DISAMBIGUATORS: [&dyn Disambiguator; 4] = [
    &SingleChoiceDisambiguator,
    &AnnotationDisambiguator,
    &SingleConstructorDisambiguator,
    &SingleStaticFactoryDisambiguator,
];

/// 在候选之间选出唯一一个，失败时返回拼接后的原因
pub fn disambiguate(options: &InstantiationOptions) -> Result<Candidate, String> {
    let mut ignore_reasons = Vec::new();
    for disambiguator in DISAMBIGUATORS {
        match disambiguator.disambiguate(options) {
            Disambiguation::Success(candidate) => return Ok(candidate),
            Disambiguation::Ignore(reason) => ignore_reasons.push(reason),
            Disambiguation::Error(reason) => return Err(reason),
        }
    }
    Err(ignore_reasons.join("\n"))
}

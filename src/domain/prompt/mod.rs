//! Prompt templates for the conversational workflow

pub mod conversation;
mod template;

pub use template::{render_template, PromptTemplate, TemplateError, TemplateState};

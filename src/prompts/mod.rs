//! Prompt templates for the agent

pub mod react_prompt;

pub use react_prompt::{
    generate_observation_prompt, generate_question_prompt, generate_system_prompt,
    OBSERVATION_STOP,
};

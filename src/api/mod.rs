pub mod limesurvey;

pub use limesurvey::{LimeSurveyClient, ResponseSource};

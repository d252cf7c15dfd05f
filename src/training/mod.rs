//! Price model training
//!
//! A random forest regressor over the feature table, evaluated on a
//! seeded hold-out split with metrics reported in 만원.

pub mod decision_tree;
mod engine;
mod models;
pub mod random_forest;
mod split;

pub use decision_tree::DecisionTree;
pub use engine::{columns_to_array2, TrainEngine, TrainingReport};
pub use models::ModelMetrics;
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, TrainTestSplit};

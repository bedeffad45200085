//! A small convolutional network trained on MNIST.
//!
//! The crate is intentionally minimal: a fixed-topology model, a training
//! loop and an evaluation loop, all built on the [burn] framework. Every
//! epoch ends with an evaluation pass over the test split, printed as
//! `Accuracy: <pct>%, Avg loss: <float>`.

pub mod data;
pub mod model;
pub mod training;

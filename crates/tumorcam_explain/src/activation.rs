//! Activation and gradient capture utilities.

use std::collections::HashMap;

use burn::prelude::*;

/// Activations and gradients captured at named layers.
#[derive(Debug, Clone)]
pub struct LayerCapture<B: Backend> {
    activations: HashMap<String, Tensor<B, 4>>,
    gradients: HashMap<String, Tensor<B, 4>>,
}

impl<B: Backend> LayerCapture<B> {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self {
            activations: HashMap::new(),
            gradients: HashMap::new(),
        }
    }

    /// Store an activation.
    pub fn store_activation(&mut self, name: &str, activation: Tensor<B, 4>) {
        self.activations.insert(name.to_string(), activation);
    }

    /// Store a gradient.
    pub fn store_gradient(&mut self, name: &str, gradient: Tensor<B, 4>) {
        self.gradients.insert(name.to_string(), gradient);
    }

    /// Get an activation by layer name.
    pub fn activation(&self, name: &str) -> Option<&Tensor<B, 4>> {
        self.activations.get(name)
    }

    /// Get a gradient by layer name.
    pub fn gradient(&self, name: &str) -> Option<&Tensor<B, 4>> {
        self.gradients.get(name)
    }

    /// Remove and return the activation and gradient of a layer, if both exist.
    pub fn take(&mut self, name: &str) -> Option<(Tensor<B, 4>, Tensor<B, 4>)> {
        if !(self.activations.contains_key(name) && self.gradients.contains_key(name)) {
            return None;
        }
        let activation = self.activations.remove(name)?;
        let gradient = self.gradients.remove(name)?;
        Some((activation, gradient))
    }

    /// Names of layers with a stored activation.
    pub fn names(&self) -> Vec<&str> {
        self.activations.keys().map(|s| s.as_str()).collect()
    }

    /// Clear all stored tensors.
    pub fn clear(&mut self) {
        self.activations.clear();
        self.gradients.clear();
    }
}

impl<B: Backend> Default for LayerCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

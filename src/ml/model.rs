// ============================================================
// Layer 5 — Model
// ============================================================
// Parameters<B> is the burn Module: only the learned tensors,
// one Conv2d per Conv2D layer and one Linear per Dense layer.
// The layer list that says how to use them lives beside it in
// the Architecture, outside the Module, so the optimizer and the
// recorders only ever see tensors.
//
// Dropout takes the Mode explicitly; Eval makes it the identity.

use burn::{
    module::AutodiffModule,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::MaxPool2dConfig,
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation, backend::AutodiffBackend, Distribution},
};

use crate::domain::{
    control::Mode,
    shape::{FeatureShape, ImageShape},
};
use crate::error::ModelError;
use crate::ml::architecture::{Architecture, StackConfig};
use crate::ml::layer::{ActivationKind, LayerSpec, Padding};

/// The learned tensors, one entry per Conv2D / Dense layer in stack order.
/// Record keys follow the field names: `convs.0.weight`, `denses.1.bias`, ...
#[derive(Module, Debug)]
pub struct Parameters<B: Backend> {
    pub convs:  Vec<Conv2d<B>>,
    pub denses: Vec<Linear<B>>,
}

impl Architecture {
    /// Allocate freshly initialised parameters for every parameterized layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Parameters<B> {
        let mut convs  = Vec::new();
        let mut denses = Vec::new();

        for (i, layer) in self.layers().iter().enumerate() {
            let input = self.input_of(i);
            match *layer {
                LayerSpec::Conv2d { filters, kernel_size, padding } => {
                    let FeatureShape::Spatial { channels, .. } = input else {
                        unreachable!("architecture validated at construction");
                    };
                    let padding = match padding {
                        Padding::Same => PaddingConfig2d::Same,
                        Padding::Valid => PaddingConfig2d::Valid,
                    };
                    convs.push(
                        Conv2dConfig::new([channels, filters], [kernel_size, kernel_size])
                            .with_padding(padding)
                            .init(device),
                    );
                }
                LayerSpec::Dense { units } => {
                    denses.push(LinearConfig::new(input.volume(), units).init(device));
                }
                _ => {}
            }
        }

        Parameters { convs, denses }
    }
}

/// Activations between two layers: a [N, C, H, W] feature map or a [N, F] matrix.
enum Activations<B: Backend> {
    Spatial(Tensor<B, 4>),
    Flat(Tensor<B, 2>),
}

fn activate<B: Backend, const D: usize>(x: Tensor<B, D>, kind: ActivationKind) -> Tensor<B, D> {
    match kind {
        ActivationKind::Relu => activation::relu(x),
        ActivationKind::Sigmoid => activation::sigmoid(x),
        ActivationKind::Tanh => activation::tanh(x),
        ActivationKind::Softmax => activation::softmax(x, 1),
    }
}

/// Zero each unit with probability `rate`, scale survivors by 1 / (1 - rate).
fn dropout<B: Backend, const D: usize>(x: Tensor<B, D>, rate: f64) -> Tensor<B, D> {
    if rate == 0.0 {
        return x;
    }
    let zeroed = x.random_like(Distribution::Bernoulli(rate)).equal_elem(1.0);
    x.mask_fill(zeroed, 0.0) * (1.0 / (1.0 - rate))
}

#[derive(Debug)]
pub struct Model<B: Backend> {
    architecture: Architecture,
    class_names:  Vec<String>,
    params:       Parameters<B>,
}

impl<B: Backend> Model<B> {
    /// The default stack for `input_shape` and `num_classes`.
    pub fn build(input_shape: ImageShape, num_classes: usize, device: &B::Device) -> Result<Self, ModelError> {
        Self::with_stack(input_shape, num_classes, &StackConfig::new(), device)
    }

    pub fn with_stack(
        input_shape: ImageShape,
        num_classes: usize,
        stack:       &StackConfig,
        device:      &B::Device,
    ) -> Result<Self, ModelError> {
        let architecture = Architecture::standard(input_shape, num_classes, stack)?;
        Ok(Self::from_architecture(architecture, device))
    }

    pub fn from_architecture(architecture: Architecture, device: &B::Device) -> Self {
        let params = architecture.init(device);
        Self { architecture, class_names: Vec::new(), params }
    }

    pub fn from_parts(architecture: Architecture, class_names: Vec<String>, params: Parameters<B>) -> Self {
        Self { architecture, class_names, params }
    }

    /// Attach the label names, index i naming class i.
    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn params(&self) -> &Parameters<B> {
        &self.params
    }

    pub fn into_params(self) -> Parameters<B> {
        self.params
    }

    /// Swap in an updated parameter set (the optimizer step hands back a new one).
    pub fn map_params(self, f: impl FnOnce(Parameters<B>) -> Parameters<B>) -> Self {
        Self {
            architecture: self.architecture,
            class_names:  self.class_names,
            params:       f(self.params),
        }
    }

    /// images: [batch, channels, height, width] → scores before the softmax head: [batch, num_classes]
    pub fn forward_logits(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let layers = self.architecture.layers();
        // The softmax head is the last layer; stop right before it.
        let body = &layers[..layers.len() - 1];

        let mut x = Activations::Spatial(images);
        let mut conv_idx  = 0;
        let mut dense_idx = 0;

        for layer in body {
            x = match (*layer, x) {
                (LayerSpec::Conv2d { .. }, Activations::Spatial(t)) => {
                    let t = self.params.convs[conv_idx].forward(t);
                    conv_idx += 1;
                    Activations::Spatial(t)
                }
                (LayerSpec::Dense { .. }, Activations::Flat(t)) => {
                    let t = self.params.denses[dense_idx].forward(t);
                    dense_idx += 1;
                    Activations::Flat(t)
                }
                (LayerSpec::Activation { kind }, Activations::Spatial(t)) => Activations::Spatial(activate(t, kind)),
                (LayerSpec::Activation { kind }, Activations::Flat(t)) => Activations::Flat(activate(t, kind)),
                (LayerSpec::MaxPool2d { pool_size }, Activations::Spatial(t)) => {
                    let pool = MaxPool2dConfig::new([pool_size, pool_size])
                        .with_strides([pool_size, pool_size])
                        .init();
                    Activations::Spatial(pool.forward(t))
                }
                (LayerSpec::Dropout { .. }, x) if !mode.is_train() => x,
                (LayerSpec::Dropout { rate }, Activations::Spatial(t)) => Activations::Spatial(dropout(t, rate)),
                (LayerSpec::Dropout { rate }, Activations::Flat(t)) => Activations::Flat(dropout(t, rate)),
                (LayerSpec::Flatten, Activations::Spatial(t)) => Activations::Flat(t.flatten(1, 3)),
                (LayerSpec::Flatten, x @ Activations::Flat(_)) => x,
                (layer, _) => unreachable!("architecture validated at construction, {layer} got the wrong rank"),
            };
        }

        match x {
            Activations::Flat(t) => t,
            Activations::Spatial(_) => unreachable!("architecture validated at construction, head input is flat"),
        }
    }

    /// images: [batch, channels, height, width] → class probabilities: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        activation::softmax(self.forward_logits(images, mode), 1)
    }

    /// Evaluation-mode forward pass.
    pub fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images, Mode::Eval)
    }
}

impl<B: Backend> Clone for Model<B> {
    fn clone(&self) -> Self {
        Self {
            architecture: self.architecture.clone(),
            class_names:  self.class_names.clone(),
            params:       self.params.clone(),
        }
    }
}

impl<B: AutodiffBackend> Model<B> {
    /// The same model on the inner backend, without the autodiff graph.
    pub fn valid(&self) -> Model<B::InnerBackend> {
        Model {
            architecture: self.architecture.clone(),
            class_names:  self.class_names.clone(),
            params:       self.params.valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::layer::LayerSpec;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_model() -> Model<TestBackend> {
        let device = Default::default();
        Model::with_stack(
            ImageShape::new(16, 16, 3),
            4,
            &StackConfig::new().with_conv_filters(vec![4, 8]).with_dense_units(16),
            &device,
        )
        .unwrap()
    }

    fn images(batch: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random([batch, 3, 16, 16], Distribution::Uniform(0.0, 1.0), &device)
    }

    fn assert_probabilities(probs: Tensor<TestBackend, 2>) {
        let [batch, classes] = probs.dims();
        let values = probs.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(classes) {
            assert!(row.iter().all(|&p| p >= 0.0));
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row sums to {sum}");
        }
        assert_eq!(values.len(), batch * classes);
    }

    #[test]
    fn test_forward_produces_probabilities() {
        let model = small_model();
        let probs = model.forward(images(3), Mode::Eval);
        assert_eq!(probs.dims(), [3, 4]);
        assert_probabilities(probs);
    }

    #[test]
    fn test_train_mode_still_produces_probabilities() {
        let model = small_model();
        assert_probabilities(model.forward(images(2), Mode::Train));
    }

    #[test]
    fn test_parameter_sets_match_architecture() {
        let model = small_model();
        assert_eq!(model.params().convs.len(), 4);
        assert_eq!(model.params().denses.len(), 2);
        assert_eq!(model.params().num_params(), model.architecture().num_params());
    }

    #[test]
    fn test_eval_dropout_is_identity() {
        let with_dropout = small_model();

        // Same parameters, same stack, but without the dropout layers.
        let layers: Vec<LayerSpec> = with_dropout
            .architecture()
            .layers()
            .iter()
            .copied()
            .filter(|l| !matches!(l, LayerSpec::Dropout { .. }))
            .collect();
        let arch = Architecture::new(ImageShape::new(16, 16, 3), 4, layers).unwrap();
        let without_dropout = Model::<TestBackend>::from_parts(arch, Vec::new(), with_dropout.params().clone());

        let x = images(2);
        let a = with_dropout.forward(x.clone(), Mode::Eval).into_data();
        let b = without_dropout.forward(x, Mode::Eval).into_data();
        a.assert_approx_eq(&b, 6);
    }

    #[test]
    fn test_eval_is_deterministic() {
        let model = small_model();
        let x = images(2);
        let a = model.predict(x.clone()).into_data();
        let b = model.predict(x).into_data();
        a.assert_approx_eq(&b, 6);
    }

    #[test]
    fn test_dropout_zeroes_and_rescales() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::ones([8, 64], &device);
        let y = dropout(x, 0.5).into_data().to_vec::<f32>().unwrap();

        assert!(y.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        let zeros = y.iter().filter(|&&v| v == 0.0).count();
        // 512 draws at p = 0.5; anything outside this band is astronomically unlikely
        assert!(zeros > 128 && zeros < 384, "{zeros} zeros");
    }
}

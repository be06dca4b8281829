use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tch::{Device, Kind, Tensor, nn};

use super::interpret::ClassProbabilities;
use super::preprocess::{IMAGE_SIZE, ImageTensor};
use super::weights;

/// Bumped whenever [`TOPOLOGY`] changes; weight archives are only valid for
/// the version they were exported against.
pub const TOPOLOGY_VERSION: u32 = 1;
pub const ARCHITECTURE: &str = "VGG16 + Custom Dense Layers";

const FEATURE_SIDE: i64 = (IMAGE_SIZE / 32) as i64;
const FLAT_FEATURES: i64 = 512 * FEATURE_SIDE * FEATURE_SIDE;
const NUM_CLASSES: i64 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("weights file not found at {}", .0.display())]
    WeightsNotFound(PathBuf),
    #[error("weights do not match the model topology: {0}")]
    WeightsLoad(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Softmax,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerKind {
    /// 3x3 convolution, stride 1, same padding, ReLU.
    Conv { in_channels: i64, out_channels: i64 },
    /// 2x2 max pooling, stride 2.
    MaxPool,
    /// Channels-last flatten.
    Flatten,
    Dropout(f64),
    Dense { inputs: i64, outputs: i64, activation: Activation },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec {
    pub name: &'static str,
    pub kind: LayerKind,
    pub trainable: bool,
}

const fn conv(
    name: &'static str,
    in_channels: i64,
    out_channels: i64,
    trainable: bool,
) -> LayerSpec {
    LayerSpec {
        name,
        kind: LayerKind::Conv { in_channels, out_channels },
        trainable,
    }
}

const fn pool(name: &'static str) -> LayerSpec {
    LayerSpec { name, kind: LayerKind::MaxPool, trainable: false }
}

/// Layer order of the classifier. The VGG16 backbone is frozen except for its
/// last three convolutions; the dense head is trainable.
pub const TOPOLOGY: &[LayerSpec] = &[
    conv("block1_conv1", 3, 64, false),
    conv("block1_conv2", 64, 64, false),
    pool("block1_pool"),
    conv("block2_conv1", 64, 128, false),
    conv("block2_conv2", 128, 128, false),
    pool("block2_pool"),
    conv("block3_conv1", 128, 256, false),
    conv("block3_conv2", 256, 256, false),
    conv("block3_conv3", 256, 256, false),
    pool("block3_pool"),
    conv("block4_conv1", 256, 512, false),
    conv("block4_conv2", 512, 512, false),
    conv("block4_conv3", 512, 512, false),
    pool("block4_pool"),
    conv("block5_conv1", 512, 512, true),
    conv("block5_conv2", 512, 512, true),
    conv("block5_conv3", 512, 512, true),
    pool("block5_pool"),
    LayerSpec { name: "flatten", kind: LayerKind::Flatten, trainable: false },
    LayerSpec { name: "dropout", kind: LayerKind::Dropout(0.3), trainable: false },
    LayerSpec {
        name: "dense",
        kind: LayerKind::Dense {
            inputs: FLAT_FEATURES,
            outputs: 128,
            activation: Activation::Relu,
        },
        trainable: true,
    },
    LayerSpec { name: "dropout_1", kind: LayerKind::Dropout(0.2), trainable: false },
    LayerSpec {
        name: "dense_1",
        kind: LayerKind::Dense {
            inputs: 128,
            outputs: NUM_CLASSES,
            activation: Activation::Softmax,
        },
        trainable: true,
    },
];

/// One tensor of the weight archive, in the channels-last layout it is
/// stored with.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSlot {
    pub layer: &'static str,
    pub role: &'static str,
    pub shape: Vec<i64>,
}

impl LayerSpec {
    fn weight_slots(&self) -> Vec<WeightSlot> {
        let (kernel, bias) = match self.kind {
            LayerKind::Conv { in_channels, out_channels } => {
                (vec![3, 3, in_channels, out_channels], vec![out_channels])
            }
            LayerKind::Dense { inputs, outputs, .. } => (vec![inputs, outputs], vec![outputs]),
            LayerKind::MaxPool | LayerKind::Flatten | LayerKind::Dropout(_) => return Vec::new(),
        };
        vec![
            WeightSlot { layer: self.name, role: "kernel", shape: kernel },
            WeightSlot { layer: self.name, role: "bias", shape: bias },
        ]
    }

    fn parameter_count(&self) -> u64 {
        self.weight_slots()
            .iter()
            .map(|slot| slot.shape.iter().product::<i64>() as u64)
            .sum()
    }
}

pub fn weight_slots() -> Vec<WeightSlot> {
    TOPOLOGY.iter().flat_map(LayerSpec::weight_slots).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterCounts {
    pub total: u64,
    pub trainable: u64,
}

pub fn parameter_counts() -> ParameterCounts {
    TOPOLOGY.iter().fold(ParameterCounts::default(), |counts, layer| {
        let params = layer.parameter_count();
        ParameterCounts {
            total: counts.total + params,
            trainable: counts.trainable + if layer.trainable { params } else { 0 },
        }
    })
}

pub trait Classifier: Send + Sync {
    fn predict(&self, tensor: &ImageTensor) -> Result<ClassProbabilities, ModelError>;

    fn parameter_counts(&self) -> ParameterCounts {
        parameter_counts()
    }
}

enum Layer {
    Conv(nn::Conv2D),
    MaxPool,
    Flatten,
    Dropout(f64),
    Dense(nn::Linear, Activation),
}

struct Network {
    layers: Vec<Layer>,
}

impl Network {
    fn assemble(root: &nn::Path) -> Self {
        let layers = TOPOLOGY
            .iter()
            .map(|spec| {
                let layer = match spec.kind {
                    LayerKind::Conv { in_channels, out_channels } => {
                        let config = nn::ConvConfig { padding: 1, ..Default::default() };
                        let path = root / spec.name;
                        Layer::Conv(nn::conv2d(path, in_channels, out_channels, 3, config))
                    }
                    LayerKind::MaxPool => Layer::MaxPool,
                    LayerKind::Flatten => Layer::Flatten,
                    LayerKind::Dropout(rate) => Layer::Dropout(rate),
                    LayerKind::Dense { inputs, outputs, activation } => Layer::Dense(
                        nn::linear(root / spec.name, inputs, outputs, Default::default()),
                        activation,
                    ),
                };
                if !spec.trainable {
                    layer.freeze();
                }
                layer
            })
            .collect();
        Self { layers }
    }

    /// `input` is NHWC; convolutions run channels-first and the flatten goes
    /// back to channels-last so the dense kernel lines up with the stored one.
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut xs = input.permute([0, 3, 1, 2]);
        for layer in &self.layers {
            xs = match layer {
                Layer::Conv(conv) => xs.apply(conv).relu(),
                Layer::MaxPool => xs.max_pool2d_default(2),
                Layer::Flatten => xs.permute([0, 2, 3, 1]).flatten(1, -1),
                Layer::Dropout(rate) => xs.dropout(*rate, false),
                Layer::Dense(linear, Activation::Relu) => xs.apply(linear).relu(),
                Layer::Dense(linear, Activation::Softmax) => {
                    xs.apply(linear).softmax(-1, Kind::Float)
                }
            };
        }
        xs
    }

    /// Copies positional tensors into the layers, converting channels-last
    /// kernels to torch's layout. Shapes must already be checked.
    fn assign(&mut self, tensors: Vec<Tensor>) -> Result<(), ModelError> {
        let mut tensors = tensors.into_iter();
        tch::no_grad(|| {
            for layer in &mut self.layers {
                let (ws, bs, kernel) = match layer {
                    Layer::Conv(conv) => {
                        let kernel = next_tensor(&mut tensors)?.permute([3, 2, 0, 1]);
                        (&mut conv.ws, conv.bs.as_mut(), kernel)
                    }
                    Layer::Dense(linear, _) => {
                        let kernel = next_tensor(&mut tensors)?.transpose(0, 1);
                        (&mut linear.ws, linear.bs.as_mut(), kernel)
                    }
                    Layer::MaxPool | Layer::Flatten | Layer::Dropout(_) => continue,
                };
                let bias = next_tensor(&mut tensors)?;
                ws.f_copy_(&kernel).map_err(load_error)?;
                bs.ok_or_else(|| ModelError::WeightsLoad("layer has no bias".to_string()))?
                    .f_copy_(&bias)
                    .map_err(load_error)?;
            }
            Ok(())
        })
    }
}

impl Layer {
    fn freeze(&self) {
        let (ws, bs) = match self {
            Layer::Conv(conv) => (&conv.ws, conv.bs.as_ref()),
            Layer::Dense(linear, _) => (&linear.ws, linear.bs.as_ref()),
            Layer::MaxPool | Layer::Flatten | Layer::Dropout(_) => return,
        };
        let _ = ws.set_requires_grad(false);
        if let Some(bs) = bs {
            let _ = bs.set_requires_grad(false);
        }
    }
}

fn next_tensor(tensors: &mut impl Iterator<Item = Tensor>) -> Result<Tensor, ModelError> {
    tensors
        .next()
        .ok_or_else(|| ModelError::WeightsLoad("weight archive ended early".to_string()))
}

fn load_error(err: tch::TchError) -> ModelError {
    ModelError::WeightsLoad(err.to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "forward pass panicked".to_string()
    }
}

struct Inner {
    _vs: nn::VarStore,
    network: Network,
}

/// The brain-MRI classifier backed by libtorch.
pub struct TumorClassifier {
    inner: Mutex<Inner>,
    device: Device,
}

impl TumorClassifier {
    /// Builds the topology with freshly initialized parameters.
    pub fn assemble(device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let network = Network::assemble(&vs.root());
        Self {
            inner: Mutex::new(Inner { _vs: vs, network }),
            device,
        }
    }

    pub fn load(weights_path: &Path, device: Device) -> Result<Self, ModelError> {
        let mut classifier = Self::assemble(device);
        classifier.load_weights(weights_path)?;
        Ok(classifier)
    }

    pub fn load_weights(&mut self, weights_path: &Path) -> Result<(), ModelError> {
        let tensors = weights::read_positional(weights_path)?;
        let shapes: Vec<Vec<i64>> = tensors.iter().map(Tensor::size).collect();
        weights::check_shapes(&weight_slots(), &shapes)?;

        let inner = self
            .inner
            .get_mut()
            .map_err(|_| ModelError::WeightsLoad("model lock poisoned".to_string()))?;
        inner.network.assign(tensors)?;
        log::info!(
            "Loaded {} weight tensors from {} (topology v{})",
            shapes.len(),
            weights_path.display(),
            TOPOLOGY_VERSION
        );
        Ok(())
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl Classifier for TumorClassifier {
    fn predict(&self, tensor: &ImageTensor) -> Result<ClassProbabilities, ModelError> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&dim| dim as i64).collect();
        let input = Tensor::from_slice(&tensor.to_vec())
            .f_view(shape.as_slice())
            .map_err(|e| ModelError::Inference(e.to_string()))?
            .to_device(self.device);

        let inner = self
            .inner
            .lock()
            .map_err(|_| ModelError::Inference("model lock poisoned".to_string()))?;
        let output = panic::catch_unwind(AssertUnwindSafe(|| {
            tch::no_grad(|| inner.network.forward(&input))
        }))
        .map_err(|payload| ModelError::Inference(panic_message(payload)))?;
        drop(inner);

        let output_flat = output.to_device(Device::Cpu).to_kind(Kind::Float).view([-1]);
        let num_elements = output_flat.numel();
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);

        let probabilities = ClassProbabilities::from_slice(&output_vec).ok_or_else(|| {
            ModelError::Inference(format!(
                "expected {} class scores, got {}",
                NUM_CLASSES, num_elements
            ))
        })?;
        probabilities.validate().map_err(ModelError::Inference)?;
        Ok(probabilities)
    }
}

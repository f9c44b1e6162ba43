use std::{convert::TryFrom, path::Path};

use anyhow::{Context, Result, bail};
use tch::{self, Device, IValue, Kind, Tensor};
use tracing::debug;

use crate::{Detection, ObjectDetector, YoloParams, decode_yolov8, preprocess::preprocess_bgr};

/// TorchScript YOLOv8 detector.
pub struct Detector {
    module: tch::CModule,
    device: Device,
    input_size: (i64, i64),
    params: YoloParams,
}

impl Detector {
    /// Load a TorchScript module onto `device`. `input_size` is (width, height).
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        device: Device,
        input_size: (i64, i64),
    ) -> Result<Self> {
        let path = model_path.as_ref();
        let mut module = tch::CModule::load_on_device(path, device)
            .with_context(|| format!("failed to load TorchScript model {}", path.display()))?;
        module.set_eval();
        Ok(Self {
            module,
            device,
            input_size,
            params: YoloParams::default(),
        })
    }

    pub fn with_params(mut self, params: YoloParams) -> Self {
        self.params = params;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn input_size(&self) -> (i64, i64) {
        self.input_size
    }

    fn to_tensor(&self, bgr: &[u8], width: i32, height: i32) -> Result<Tensor> {
        let (in_w, in_h) = self.input_size;
        let chw = preprocess_bgr(bgr, width, height, (in_w as u32, in_h as u32))?;
        Ok(Tensor::from_slice(&chw)
            .view([1, 3, in_h, in_w])
            .to_device(self.device))
    }

    fn forward(&self, input: Tensor) -> Result<Tensor> {
        let output = tch::no_grad(|| self.module.forward_is(&[IValue::Tensor(input)]))?;
        match output {
            IValue::Tensor(tensor) => Ok(tensor),
            IValue::Tuple(mut values) | IValue::GenericList(mut values) if !values.is_empty() => {
                match values.swap_remove(0) {
                    IValue::Tensor(tensor) => Ok(tensor),
                    other => bail!("unexpected first detector output: {other:?}"),
                }
            }
            IValue::TensorList(mut tensors) if !tensors.is_empty() => Ok(tensors.swap_remove(0)),
            other => bail!("unexpected detector output: {other:?}"),
        }
    }
}

impl ObjectDetector for Detector {
    fn detect(&mut self, bgr: &[u8], width: i32, height: i32) -> Result<Vec<Detection>> {
        let input = self.to_tensor(bgr, width, height)?;
        let output = self.forward(input)?;

        let shape = output.size();
        if shape.len() != 3 || shape[0] != 1 {
            bail!("unexpected detector output shape: {shape:?}");
        }
        let channels = shape[1] as usize;
        let predictions = shape[2] as usize;

        let flat = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .contiguous()
            .view([-1]);
        let values = Vec::<f32>::try_from(&flat)?;

        let (in_w, in_h) = self.input_size;
        let scale = (width as f32 / in_w as f32, height as f32 / in_h as f32);
        let detections = decode_yolov8(&values, channels, predictions, &self.params, scale)?;
        debug!(
            channels,
            predictions,
            kept = detections.len(),
            "decoded detector output"
        );
        Ok(detections)
    }
}

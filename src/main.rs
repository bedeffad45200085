use burn::optim::AdamConfig;
use mnist_cnn::model::ModelConfig;
use mnist_cnn::training::TrainingConfig;

fn config() -> TrainingConfig {
    TrainingConfig::new(ModelConfig::new(), AdamConfig::new())
}

#[cfg(feature = "ndarray")]
mod ndarray {
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use mnist_cnn::training;

    pub fn run() {
        training::train::<Autodiff<NdArray<f32>>>(super::config(), NdArrayDevice::Cpu);
    }
}

#[cfg(any(feature = "tch-cpu", feature = "tch-gpu"))]
mod tch {
    use burn::backend::{libtorch::LibTorchDevice, Autodiff, LibTorch};
    use mnist_cnn::training;

    pub fn run() {
        #[cfg(feature = "tch-cpu")]
        let device = LibTorchDevice::Cpu;
        #[cfg(all(feature = "tch-gpu", not(target_os = "macos")))]
        let device = LibTorchDevice::Cuda(0);
        #[cfg(all(feature = "tch-gpu", target_os = "macos"))]
        let device = LibTorchDevice::Mps;

        training::train::<Autodiff<LibTorch<f32>>>(super::config(), device);
    }
}

#[cfg(feature = "wgpu")]
mod wgpu {
    use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
    use mnist_cnn::training;

    pub fn run() {
        training::train::<Autodiff<Wgpu>>(super::config(), WgpuDevice::default());
    }
}

fn init_logger() {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("Failed to install the terminal logger");
}

fn main() {
    init_logger();

    #[cfg(feature = "ndarray")]
    ndarray::run();
    #[cfg(any(feature = "tch-cpu", feature = "tch-gpu"))]
    tch::run();
    #[cfg(feature = "wgpu")]
    wgpu::run();
}

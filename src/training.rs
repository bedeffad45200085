use std::fmt;

use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::vision::MnistDataset,
    },
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{MnistBatch, MnistBatcher};
use crate::model::{nll_loss, Model, ModelConfig};

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
}

/// Aggregated metrics of one pass over an evaluation dataset.
#[derive(Clone, Copy, Debug)]
pub struct EvalReport {
    /// Loss sum divided by the number of batches.
    pub avg_loss: f64,
    /// Fraction of examples whose predicted class matches the label.
    pub accuracy: f64,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Accuracy: {:.1}%, Avg loss: {:.6}",
            self.accuracy * 100.0,
            self.avg_loss
        )
    }
}

/// Trains the model on the MNIST training split, evaluating on the test split
/// after every epoch.
pub fn train<B: AutodiffBackend>(config: TrainingConfig, device: B::Device) -> Model<B> {
    let batcher_train = MnistBatcher::<B>::new(device.clone());
    let batcher_valid = MnistBatcher::<B::InnerBackend>::new(device.clone());

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(MnistDataset::train());

    let dataloader_test = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(MnistDataset::test());

    let mut model = config.model.init::<B>(&device);
    let mut optim = config.optimizer.init();

    log::info!(
        "Training on {} images, evaluating on {}",
        dataloader_train.num_items(),
        dataloader_test.num_items()
    );

    for epoch in 1..=config.num_epochs {
        let (updated, train_loss) = fit_epoch(
            model,
            &mut optim,
            config.learning_rate,
            dataloader_train.as_ref(),
        );
        model = updated;
        log::info!("[Epoch {epoch}] Train loss: {train_loss:.6}");

        let report = evaluate(&model.valid(), dataloader_test.as_ref());
        println!("{report}");
    }

    model
}

/// Runs one pass over the training batches, returning the updated model and
/// the average training loss.
///
/// Each batch is processed to completion before the next one starts: forward,
/// loss, backward, one optimizer step. The gradients are consumed by the step,
/// so none carry over between batches.
pub fn fit_epoch<B: AutodiffBackend, O: Optimizer<Model<B>, B>>(
    mut model: Model<B>,
    optim: &mut O,
    learning_rate: f64,
    loader: &dyn DataLoader<MnistBatch<B>>,
) -> (Model<B>, f64) {
    let mut loss_sum = 0.0;
    let mut num_batches = 0usize;

    for batch in loader.iter() {
        let output = model.forward(batch.images);
        let loss = nll_loss(output, batch.targets);
        loss_sum += loss.clone().into_scalar().elem::<f64>();
        num_batches += 1;

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(learning_rate, model, grads);
    }

    (model, loss_sum / num_batches.max(1) as f64)
}

/// Computes average loss and accuracy over a dataset without touching the
/// model parameters.
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    loader: &dyn DataLoader<MnistBatch<B>>,
) -> EvalReport {
    let mut loss_sum = 0.0;
    let mut num_batches = 0usize;
    let mut correct = 0usize;
    let mut total = 0usize;

    for batch in loader.iter() {
        let targets = batch.targets;
        let output = model.forward(batch.images);
        let loss = nll_loss(output.clone(), targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>();
        num_batches += 1;

        let predictions = output.argmax(1).squeeze(1);
        total += targets.dims()[0];
        correct += predictions
            .equal(targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;
    }

    EvalReport {
        avg_loss: loss_sum / num_batches.max(1) as f64,
        accuracy: correct as f64 / total.max(1) as f64,
    }
}

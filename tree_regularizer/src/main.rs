use std::env;

use anyhow::Context;
use log::info;
use tree_regularizer::{
    Scheduler, TrainingConfig, TrainingContext, data,
    evaluate::{Confusion, evaluate},
    metrics::{LogSink, SeriesRecorder},
};

const DEFAULT_DATA: &str = "data.txt";

fn print_confusion(title: &str, confusion: &Confusion) {
    println!(
        "{title}: accuracy {:.4} (TP: {}, FP: {}, FN: {}, TN: {})",
        confusion.accuracy(),
        confusion.true_pos,
        confusion.false_pos,
        confusion.false_neg,
        confusion.true_neg
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::var("TREE_REG_CONFIG") {
        Ok(path) => {
            TrainingConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        Err(_) => TrainingConfig::default(),
    };
    let ctx = TrainingContext::new(config)?;

    let data_path = env::var("TREE_REG_DATA").unwrap_or_else(|_| DEFAULT_DATA.to_string());
    let dataset =
        data::read_rows(&data_path).with_context(|| format!("reading dataset {data_path}"))?;
    info!(
        samples = dataset.len(),
        features = dataset.x_size();
        "loaded dataset from {data_path}"
    );

    let mut rng = ctx.rng();
    let (train, test) = data::train_test_split(&dataset, ctx.config().test_fraction, &mut rng)?;
    let network = ctx.build_network(train.x_size(), &mut rng)?;
    let x_reference = test.x().to_owned();

    let mut recorder = SeriesRecorder::new();
    let mut scheduler = Scheduler::new(
        &ctx,
        network,
        train.clone(),
        x_reference,
        (LogSink, &mut recorder),
    )?;
    scheduler.run()?;

    let retrains = scheduler.retrains();
    let network = scheduler.into_network();
    let report = evaluate(&network, &train, &test, &ctx.estimator())?;

    println!("surrogate retrains: {retrains}");
    println!(
        "loss: train {:.4}, test {:.4}",
        report.train_loss, report.test_loss
    );
    println!("average path length: {:.4}", report.apl);
    print_confusion("network with train data", &report.network_train);
    print_confusion("network with test data", &report.network_test);
    print_confusion("tree on labels with test data", &report.tree_raw.test);
    print_confusion("tree on network with test data", &report.tree_distilled.test);
    println!(
        "tree nodes: on labels {}, on network {}",
        report.tree_raw.nodes, report.tree_distilled.nodes
    );

    if let Ok(path) = env::var("TREE_REG_METRICS") {
        recorder
            .write_json(&path)
            .with_context(|| format!("writing metrics to {path}"))?;
        info!("metrics written to {path}");
    }

    Ok(())
}

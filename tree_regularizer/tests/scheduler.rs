mod common;

use machine_learning::Dataset;
use ndarray::Array2;
use tree_regularizer::{
    Scheduler, TrainErr, TrainingMode,
    augment::Augmentation,
    config::RetrainBudget,
    metrics::SeriesRecorder,
    scheduler::EpochKind,
    surrogate::SurrogateStart,
};

use common::{setup, small_config};

#[test]
fn twelve_epochs_with_interval_five_retrain_twice() {
    let (ctx, network, train, x_reference) = setup(small_config());
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    scheduler.run().unwrap();

    assert_eq!(scheduler.retrains(), 2);
    assert_eq!(scheduler.buffer_len(), 2);
    assert_eq!(scheduler.countdown(), 3);
    assert_eq!(scheduler.mode(), TrainingMode::SurrogateGuided);

    let retrained_after: Vec<_> = scheduler
        .history()
        .iter()
        .filter(|r| r.kind == EpochKind::Retrain)
        .map(|r| r.epoch)
        .collect();
    assert_eq!(retrained_after, [4, 9]);
}

#[test]
fn counted_budget_spends_an_epoch_on_each_retrain() {
    let config = tree_regularizer::TrainingConfig {
        retrain_budget: RetrainBudget::Counted,
        ..small_config()
    };
    let (ctx, network, train, x_reference) = setup(config);
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    scheduler.run().unwrap();

    let history = scheduler.history();
    assert_eq!(history.len(), 12);
    assert_eq!(scheduler.retrains(), 2);
    assert_eq!(scheduler.buffer_len(), 0);
    assert_eq!(history[5].kind, EpochKind::Retrain);
    assert_eq!(history[11].kind, EpochKind::Retrain);
}

#[test]
fn buffer_stays_below_the_interval() {
    let (ctx, network, train, x_reference) = setup(small_config());
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    for epoch in 0..12 {
        scheduler.run_epoch(epoch).unwrap();
        assert!(scheduler.buffer_len() < 5);
        assert_eq!(scheduler.buffer_len() + scheduler.countdown(), 5);
    }
}

#[test]
fn counted_budget_holds_a_full_buffer_until_the_retrain_epoch() {
    let config = tree_regularizer::TrainingConfig {
        retrain_budget: RetrainBudget::Counted,
        ..small_config()
    };
    let (ctx, network, train, x_reference) = setup(config);
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    let mut full_after = Vec::new();
    for epoch in 0..12 {
        scheduler.run_epoch(epoch).unwrap();
        assert!(scheduler.buffer_len() <= 5);
        if scheduler.buffer().is_full() {
            full_after.push(epoch);
        }
    }

    assert_eq!(full_after, [4, 10]);
}

#[test]
fn mode_switches_once_and_never_back() {
    let (ctx, network, train, x_reference) = setup(small_config());
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();
    let mut guided = false;

    for epoch in 0..12 {
        scheduler.run_epoch(epoch).unwrap();

        match scheduler.mode() {
            TrainingMode::Standard => {
                assert!(!guided, "went back to standard at epoch {epoch}");
                assert!(scheduler.surrogate().is_none());
            }
            TrainingMode::SurrogateGuided => {
                guided = true;
                assert!(scheduler.surrogate().is_some());
            }
        }
    }

    assert!(guided);

    let kinds: Vec<_> = scheduler.history().iter().map(|r| r.kind).collect();
    assert!(kinds[..5].iter().all(|&k| k == EpochKind::Standard));
    assert_eq!(kinds[5], EpochKind::Retrain);
    assert!(kinds[6..].iter().all(|&k| k != EpochKind::Standard));
}

#[test]
fn active_loss_adds_the_penalty_only_with_a_surrogate() {
    let (ctx, network, train, x_reference) = setup(small_config());
    let (x, y) = (train.x().to_owned(), train.y().to_owned());
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    let loss = scheduler.active_loss(x.view(), y.view()).unwrap();
    let y_pred = scheduler.network().predict(x.view()).unwrap();
    let mse = (&y_pred - &y).mapv(|e| e * e).mean().unwrap();
    assert!((loss - mse).abs() < 1e-6);

    for epoch in 0..5 {
        scheduler.run_epoch(epoch).unwrap();
    }

    let surrogate = scheduler.surrogate().unwrap();
    let penalty = surrogate.predict(scheduler.network().params()).unwrap();
    let y_pred = scheduler.network().predict(x.view()).unwrap();
    let mse = (&y_pred - &y).mapv(|e| e * e).mean().unwrap();

    let loss = scheduler.active_loss(x.view(), y.view()).unwrap();
    assert!((loss - (mse + 1e-2 * penalty)).abs() < 1e-5);
}

#[test]
fn every_series_is_recorded() {
    let (ctx, network, train, x_reference) = setup(small_config());
    let mut recorder = SeriesRecorder::new();
    let mut scheduler = Scheduler::new(&ctx, network, train, x_reference, &mut recorder).unwrap();

    scheduler.run().unwrap();
    drop(scheduler);

    assert_eq!(recorder.series("train/loss").len(), 12);
    assert_eq!(recorder.series("train/apl").len(), 12);
    assert_eq!(recorder.series("surrogate/loss").len(), 2);
    assert_eq!(recorder.series("surrogate/fit_loss/0").len(), 20);
    assert_eq!(recorder.series("surrogate/fit_loss/1").len(), 20);
    assert!(recorder.series("train/apl").iter().all(|&(_, apl)| apl >= 1.0));
}

#[test]
fn same_seed_same_run() {
    let run = || {
        let (ctx, network, train, x_reference) = setup(small_config());
        let mut scheduler =
            Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();
        scheduler.run().unwrap();
        scheduler.into_network().flatten()
    };

    assert_eq!(run(), run());
}

#[test]
fn augmented_warm_started_retrains_run() {
    let config = tree_regularizer::TrainingConfig {
        augmentation: Augmentation::Dirichlet {
            synth_count: 3,
            subset: Some(3),
        },
        surrogate_start: SurrogateStart::WarmStart,
        ..small_config()
    };
    let (ctx, network, train, x_reference) = setup(config);
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    scheduler.run().unwrap();

    assert_eq!(scheduler.retrains(), 2);
    assert_eq!(scheduler.surrogate().map(|s| s.input_dim()), Some(scheduler.network().size()));
}

#[test]
fn mismatched_reference_set_is_rejected() {
    let (ctx, network, train, _) = setup(small_config());
    let x_reference = Array2::zeros((10, 3));

    let err = Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new())
        .err()
        .unwrap();

    assert!(matches!(
        err,
        TrainErr::ShapeMismatch {
            what: "reference features",
            got: 3,
            expected: 2
        }
    ));
}

#[test]
fn non_finite_loss_is_surfaced() {
    let (ctx, network, _, x_reference) = setup(small_config());
    let train = Dataset::new(vec![0.1, 0.2, f32::NAN, 0.3, 0.4, 1.0], 2, 1).unwrap();
    let mut scheduler =
        Scheduler::new(&ctx, network, train, x_reference, SeriesRecorder::new()).unwrap();

    let err = scheduler.run_epoch(0).unwrap_err();
    assert!(matches!(err, TrainErr::NonFiniteLoss { epoch: 0, .. }));
}

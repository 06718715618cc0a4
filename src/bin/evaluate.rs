extern crate clap;
#[macro_use]
extern crate failure;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate ubr;

use std::fs::File;
use std::time::{Duration, Instant};

use clap::{App, Arg, ArgMatches, SubCommand};

use ubr::data::{Catalog, HeldOut, TrainingSet};
use ubr::datasets;
use ubr::evaluation;
use ubr::models::knn::{Hyperparameters, UserKnnModel};
use ubr::similarity::Metric;
use ubr::{ItemId, UserId, NUM_RECOMMENDATIONS};

#[derive(Debug, Serialize, Deserialize)]
struct RunRecord {
    precision: f32,
    precision_random: f32,
    precision_popularity: f32,
    elapsed: Duration,
    hyperparameters: Hyperparameters,
    normalize: bool,
    seed: u64,
}

fn main() -> Result<(), failure::Error> {
    let matches = App::new("evaluate")
        .about("Evaluate user-based nearest-neighbour recommendations over play-count data.")
        .arg(
            Arg::with_name("train")
                .long("train")
                .takes_value(true)
                .default_value("user_train.txt")
                .help("Path to the training play-count file"),
        )
        .arg(
            Arg::with_name("test")
                .long("test")
                .takes_value(true)
                .default_value("user_test.txt")
                .help("Path to the held-out favourites file"),
        )
        .arg(
            Arg::with_name("songs")
                .long("songs")
                .takes_value(true)
                .default_value("song_mapping.txt")
                .help("Path to the song catalog file"),
        )
        .arg(
            Arg::with_name("k")
                .short("k")
                .long("k")
                .takes_value(true)
                .default_value("5")
                .help("Number of neighbours to aggregate"),
        )
        .arg(
            Arg::with_name("weighted")
                .long("weighted")
                .help("Weight contributions by similarity instead of neighbour rank"),
        )
        .arg(
            Arg::with_name("normalize")
                .long("normalize")
                .help("Mean-center every user's play counts before scoring"),
        )
        .arg(
            Arg::with_name("metric")
                .long("metric")
                .takes_value(true)
                .default_value("inverse-distance")
                .help("Similarity metric: inverse-distance, dot-product or cosine"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .default_value("42")
                .help("Seed for the random baseline"),
        )
        .arg(
            Arg::with_name("results")
                .long("results")
                .takes_value(true)
                .help("Append the run's results to this JSON file"),
        )
        .subcommand(SubCommand::with_name("all").about("Evaluate precision over every user (the default)"))
        .subcommand(
            SubCommand::with_name("user")
                .about("Recommend for a single user")
                .arg(Arg::with_name("ID").required(true)),
        )
        .subcommand(
            SubCommand::with_name("artist")
                .about("Recommend for listeners of catalog entries matching a label")
                .arg(Arg::with_name("NAME").required(true)),
        )
        .get_matches();

    let k: usize = value(&matches, "k")?.parse()?;
    let seed: u64 = value(&matches, "seed")?.parse()?;
    let metric: Metric = value(&matches, "metric")?.parse()?;

    let mut training = datasets::read_training_set(value(&matches, "train")?)?;
    let held_out = datasets::read_held_out(value(&matches, "test")?)?;
    let catalog = datasets::read_catalog(value(&matches, "songs")?)?;

    let normalize = matches.is_present("normalize");
    if normalize {
        training.normalize();
    }

    let hyperparameters = Hyperparameters::new(k)
        .weighted(matches.is_present("weighted"))
        .metric(metric);
    let model = hyperparameters.clone().build();

    match matches.subcommand() {
        ("user", Some(sub)) => {
            let user_id: UserId = value(sub, "ID")?.parse()?;
            query_user(&model, &training, &held_out, &catalog, user_id)
        }
        ("artist", Some(sub)) => query_artist(&model, &training, &catalog, value(sub, "NAME")?),
        _ => query_all(
            &model,
            &training,
            &held_out,
            &catalog,
            hyperparameters,
            normalize,
            seed,
            matches.value_of("results"),
        ),
    }
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, failure::Error> {
    matches
        .value_of(name)
        .ok_or_else(|| format_err!("Missing value for --{}.", name))
}

fn query_all(
    model: &UserKnnModel,
    training: &TrainingSet,
    held_out: &HeldOut,
    catalog: &Catalog,
    hyperparameters: Hyperparameters,
    normalize: bool,
    seed: u64,
    results_path: Option<&str>,
) -> Result<(), failure::Error> {
    let start = Instant::now();
    let result = evaluation::evaluate_all(model, training, held_out, catalog, seed)?;
    let elapsed = start.elapsed();

    println!(
        "Got result with precision={:.2} in {:?}",
        result.precision, elapsed
    );
    println!("Random baseline precision={:.2}", result.precision_random);
    println!(
        "Popularity baseline precision={:.2}",
        result.precision_popularity
    );

    if let Some(path) = results_path {
        let mut records: Vec<RunRecord> = File::open(path)
            .map(|file| serde_json::from_reader(&file))
            .unwrap_or_else(|_| Ok(Vec::new()))?;

        records.push(RunRecord {
            precision: result.precision,
            precision_random: result.precision_random,
            precision_popularity: result.precision_popularity,
            elapsed,
            hyperparameters,
            normalize,
            seed,
        });

        let file = File::create(path)?;
        serde_json::to_writer_pretty(&file, &records)?;
    }

    Ok(())
}

fn query_user(
    model: &UserKnnModel,
    training: &TrainingSet,
    held_out: &HeldOut,
    catalog: &Catalog,
    user_id: UserId,
) -> Result<(), failure::Error> {
    let start = Instant::now();
    let evaluation = evaluation::evaluate_user(model, training, held_out, user_id)?;

    println!("User Playlist's Top {}", NUM_RECOMMENDATIONS);
    print_items(&evaluation.top_played, catalog)?;

    println!(
        "Top {} Recommendations (precision={:.1} in {:?})",
        NUM_RECOMMENDATIONS,
        evaluation.precision,
        start.elapsed()
    );
    print_items(&evaluation.recommended, catalog)
}

fn query_artist(
    model: &UserKnnModel,
    training: &TrainingSet,
    catalog: &Catalog,
    name: &str,
) -> Result<(), failure::Error> {
    let start = Instant::now();
    let recommended = evaluation::evaluate_artist(model, training, catalog, name);

    println!(
        "Top {} Recommendations for those who liked '{}' (in {:?})",
        NUM_RECOMMENDATIONS,
        name,
        start.elapsed()
    );
    print_items(&recommended, catalog)
}

fn print_items(item_ids: &[ItemId], catalog: &Catalog) -> Result<(), failure::Error> {
    for (position, &item_id) in item_ids.iter().enumerate() {
        let label = catalog
            .label(item_id)
            .ok_or_else(|| format_err!("No catalog entry for item {}.", item_id))?;

        println!("  {:2}. {}", position + 1, label);
    }
    println!();

    Ok(())
}

//! Loaders for plain-text play-count datasets.
//!
//! A dataset is made up of three files: training play counts (user id, an
//! interaction count, then `item:weight` pairs, whitespace-separated),
//! held-out favourites (user id, a count, then item ids), and an item
//! catalog (item id, artist and title, tab-separated).
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use failure;

use data::{Catalog, FeatureVector, HeldOut, TrainingSet};
use {ItemId, UserId};

/// Dataset error types.
#[derive(Debug, Fail)]
pub enum DatasetError {
    /// A record was missing required fields.
    #[fail(display = "Malformed record: {}", _0)]
    MalformedRecord(String),
}

/// Read a training set of play counts.
///
/// Each line holds a user id, an interaction count (ignored; the pairs that
/// follow are authoritative) and `item:weight` pairs, all whitespace
/// separated. Blank lines are skipped.
pub fn read_training_set<P: AsRef<Path>>(path: P) -> Result<TrainingSet, failure::Error> {
    let file = File::open(path)?;
    let mut users: HashMap<UserId, FeatureVector> = HashMap::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let user_id: UserId = next_field(&mut fields, &line)?.parse()?;
        let _count = fields.next();

        let mut vector = FeatureVector::new();
        for pair in fields {
            let mut parts = pair.splitn(2, ':');
            match (parts.next(), parts.next()) {
                (Some(item), Some(weight)) => {
                    vector.insert(item.parse::<ItemId>()?, weight.parse::<f32>()?);
                }
                _ => return Err(DatasetError::MalformedRecord(line.clone()).into()),
            }
        }

        users.insert(user_id, vector);
    }

    Ok(TrainingSet::from(users))
}

/// Read a held-out set of relevant items.
///
/// Each line holds a user id, a count (ignored) and the user's relevant
/// item ids, all whitespace separated.
pub fn read_held_out<P: AsRef<Path>>(path: P) -> Result<HeldOut, failure::Error> {
    let file = File::open(path)?;
    let mut users: HashMap<UserId, HashSet<ItemId>> = HashMap::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let user_id: UserId = next_field(&mut fields, &line)?.parse()?;
        let _count = fields.next();

        let mut items = HashSet::new();
        for field in fields {
            items.insert(field.parse::<ItemId>()?);
        }

        users.insert(user_id, items);
    }

    Ok(HeldOut::from(users))
}

/// Read an item catalog.
///
/// Each line holds an item id, an artist and a title, tab separated; the
/// display label is `artist - title`.
pub fn read_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog, failure::Error> {
    let file = File::open(path)?;
    let mut labels: HashMap<ItemId, String> = HashMap::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let item_id: ItemId = next_field(&mut fields, &line)?.parse()?;
        let artist = next_field(&mut fields, &line)?;
        let title = next_field(&mut fields, &line)?;

        labels.insert(item_id, format!("{} - {}", artist.trim(), title.trim()));
    }

    Ok(Catalog::from(labels))
}

fn next_field<'a, I: Iterator<Item = &'a str>>(
    fields: &mut I,
    line: &str,
) -> Result<&'a str, DatasetError> {
    fields
        .next()
        .ok_or_else(|| DatasetError::MalformedRecord(line.to_owned()))
}

//! Maps a raw stream event onto the flat `CanonicalRecord`.
//!
//! Pure and deterministic: no I/O, no retries. Every structurally incomplete
//! payload yields a `NormalizeError` instead of panicking.

use crate::error::NormalizeError;
use crate::models::{CanonicalRecord, Coordinates, Geotag, Place, RawStreamEvent, RawTweet, User};

pub fn normalize(raw: &RawStreamEvent) -> Result<CanonicalRecord, NormalizeError> {
    let tweet = content(raw).ok_or(NormalizeError::MissingContent)?;
    let author = subject(raw, tweet).ok_or(NormalizeError::MissingSubject)?;
    let place = place(raw, tweet).ok_or(NormalizeError::MissingPlace)?;

    Ok(CanonicalRecord {
        id: tweet.id.clone(),
        subject_id: author.username.clone(),
        subject_name: author.name.clone(),
        text: tweet.text.clone(),
        timestamp: tweet.created_at.clone().unwrap_or_default(),
        geo: Some(geotag(place)?),
    })
}

/// The matched tweet itself, falling back to the first expanded tweet.
fn content(raw: &RawStreamEvent) -> Option<&RawTweet> {
    raw.data.as_ref().or_else(|| raw.includes.tweets.first())
}

fn subject<'a>(raw: &'a RawStreamEvent, tweet: &RawTweet) -> Option<&'a User> {
    let users = &raw.includes.users;
    tweet
        .author_id
        .as_deref()
        .and_then(|author_id| users.iter().find(|user| user.id == author_id))
        .or_else(|| users.first())
}

fn place<'a>(raw: &'a RawStreamEvent, tweet: &RawTweet) -> Option<&'a Place> {
    let places = &raw.includes.places;
    tweet
        .geo
        .as_ref()
        .and_then(|geo| geo.place_id.as_deref())
        .and_then(|place_id| places.iter().find(|place| place.id == place_id))
        .or_else(|| places.first())
}

fn geotag(place: &Place) -> Result<Geotag, NormalizeError> {
    Ok(Geotag {
        id: place.id.clone(),
        name: place.name.clone(),
        full_name: place.full_name.clone(),
        place_type: place.place_type.clone(),
        country: place.country.clone(),
        country_code: place.country_code.clone(),
        coordinates: bbox_center(place)?,
    })
}

fn bbox_center(place: &Place) -> Result<Coordinates, NormalizeError> {
    let invalid = || NormalizeError::InvalidGeometry(place.id.clone());

    let bbox = place.geo.as_ref().map(|geo| geo.bbox.as_slice()).ok_or_else(invalid)?;
    let [west, south, east, north] = bbox else {
        return Err(invalid());
    };

    if !bbox.iter().all(|v| v.is_finite()) {
        return Err(invalid());
    }

    Ok(Coordinates {
        lat: (south + north) / 2.0,
        long: (west + east) / 2.0,
    })
}

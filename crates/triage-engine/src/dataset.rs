//! Built-in labelled complaints every model generation is trained on.
//!
//! Only `(text, category)` is curated here. Priority labels come from
//! running the scoring rules over each row, so they stay in step with the
//! active [`ScoringTable`].

use triage_core::{ScoringTable, Tier, departments as dept};

/// One labelled training row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRow {
    pub text: String,
    pub category: String,
    pub priority: Tier,
}

const BASE_COMPLAINTS: &[(&str, &str)] = &[
    // ── Road ──
    ("Deep pothole on the main road causing accidents", dept::ROAD),
    ("The asphalt is broken and dangerous to drive", dept::ROAD),
    ("Huge crack in the middle of the highway", dept::ROAD),
    ("Speed breaker is too high and unpainted", dept::ROAD),
    ("Manhole cover is missing on the footpath", dept::ROAD),
    ("Street sign fell down blocking the lane", dept::ROAD),
    ("Divider broken on the main street", dept::ROAD),
    ("Road surface is uneven and bumpy", dept::ROAD),
    ("Traffic light signal stuck on red", dept::ROAD),
    ("The road is waterlogged and slippery", dept::ROAD),
    ("Big crater on the street near the market", dept::ROAD),
    ("Footpath is broken and unsafe", dept::ROAD),
    // ── Electricity ──
    ("Street light pole is rusted and falling", dept::ELECTRICITY),
    ("Street light not working at night", dept::ELECTRICITY),
    ("Electric wire hanging loose sparks coming out", dept::ELECTRICITY),
    ("Transformer caught fire near the colony", dept::ELECTRICITY),
    ("No power supply in the area", dept::ELECTRICITY),
    ("Voltage fluctuation damaged appliances", dept::ELECTRICITY),
    ("Live wire touching the school fence", dept::ELECTRICITY),
    ("Meter box is sparking continuously", dept::ELECTRICITY),
    ("Electric pole leaning dangerously", dept::ELECTRICITY),
    ("Sparks coming from the transformer in the park", dept::ELECTRICITY),
    ("Electric pole inside the park is giving shock", dept::ELECTRICITY),
    ("Street light flickering constantly", dept::ELECTRICITY),
    // ── Water ──
    ("Dirty water coming from the tap smells bad", dept::WATER),
    ("Pipeline burst and water is wasting", dept::WATER),
    ("No water supply since yesterday", dept::WATER),
    ("Water pressure is very low", dept::WATER),
    ("Main water pipe leaking on the street", dept::WATER),
    ("Water tank leaking on the roof", dept::WATER),
    ("Contaminated water causing illness", dept::WATER),
    ("Tap water is muddy and brown", dept::WATER),
    ("Water pipe burst flooding the road", dept::WATER),
    // ── Sanitation ──
    ("Garbage truck did not come today", dept::SANITATION),
    ("Dustbins are overflowing in the park", dept::SANITATION),
    ("Sewage blocked and overflowing on road", dept::SANITATION),
    ("Drainage is clogged and mosquitoes breeding", dept::SANITATION),
    ("Bad smell coming from open drain", dept::SANITATION),
    ("Sweepers are not cleaning the streets", dept::SANITATION),
    ("Public toilet is very dirty", dept::SANITATION),
    ("Heaps of trash lying on the corner", dept::SANITATION),
    ("Dead rat smell coming from the gutter", dept::SANITATION),
    ("Waste is piling up near the school", dept::SANITATION),
    ("Garbage dump is attracting stray dogs", dept::SANITATION),
    // ── Police ──
    ("Loud noise from neighbors late at night", dept::POLICE),
    ("Suspicious people loitering in the park", dept::POLICE),
    ("Theft happened in my shop", dept::POLICE),
    ("Fighting and shouting in the street", dept::POLICE),
    ("Drunk people creating nuisance", dept::POLICE),
    ("Chain snatching incident", dept::POLICE),
    ("Domestic violence reported next door", dept::POLICE),
    ("Theft occurred at my house", dept::POLICE),
    ("Burglary attempt at home", dept::POLICE),
    ("Huge noise pollution from next door party", dept::POLICE),
    ("Loud DJ music causing noise disturbance", dept::POLICE),
    ("Neighbors creating noise pollution with speakers", dept::POLICE),
    ("Noise disturbance from late night party", dept::POLICE),
    // ── Fire ──
    ("Gas leak smell coming from neighbor's house", dept::FIRE),
    ("Huge fire broke out in the garbage dump", dept::FIRE),
    ("Cylinder blast in the kitchen", dept::FIRE),
    ("Smoke coming from the basement", dept::FIRE),
    ("Fire in the chemical factory", dept::FIRE),
    ("Short circuit caused fire", dept::FIRE),
    ("Car caught fire on the road", dept::FIRE),
    // ── Urban planning ──
    ("Illegal construction happening without permit", dept::URBAN_PLANNING),
    ("Neighbor is encroaching on public land", dept::URBAN_PLANNING),
    ("Shop extended onto the footpath illegally", dept::URBAN_PLANNING),
    ("Building violates zoning regulations", dept::URBAN_PLANNING),
    ("Illegal basement digging", dept::URBAN_PLANNING),
    ("Unauthorised floor added to the building", dept::URBAN_PLANNING),
    ("Commercial shop running in residential area", dept::URBAN_PLANNING),
    // ── Environmental ──
    ("Factory releasing black smoke causing air pollution", dept::ENVIRONMENTAL),
    ("Chemicals being dumped into the river", dept::ENVIRONMENTAL),
    ("Someone is cutting down green trees illegally", dept::ENVIRONMENTAL),
    ("Burning plastic and tires in the open", dept::ENVIRONMENTAL),
    ("Noise pollution from industrial generator", dept::ENVIRONMENTAL),
    ("Factory causing unbearable noise pollution", dept::ENVIRONMENTAL),
    ("Construction dust causing breathing issues", dept::ENVIRONMENTAL),
    ("Lake water is turning green and toxic", dept::ENVIRONMENTAL),
    // ── Animal control ──
    ("Stray dog bit a child in the colony", dept::ANIMAL_CONTROL),
    ("Herd of cows blocking the traffic", dept::ANIMAL_CONTROL),
    ("Dead animal lying on the road", dept::ANIMAL_CONTROL),
    ("Monkey menace destroying crops", dept::ANIMAL_CONTROL),
    ("Someone is beating a dog cruelly", dept::ANIMAL_CONTROL),
    ("Aggressive stray dogs chasing bikes", dept::ANIMAL_CONTROL),
    ("Injured cow needs medical attention", dept::ANIMAL_CONTROL),
    ("Snake found in the residential compound", dept::ANIMAL_CONTROL),
    // ── Disaster management ──
    ("Flood water entering houses after heavy rain", dept::DISASTER),
    ("Building collapsed trapping people inside", dept::DISASTER),
    ("Landslide blocked the mountain road", dept::DISASTER),
    ("Earthquake cracks seen on the bridge", dept::DISASTER),
    ("River level rising dangerously", dept::DISASTER),
    ("Cyclone relief shelter needed", dept::DISASTER),
    ("Cloudburst washed away the shops", dept::DISASTER),
];

/// Number of curated base rows.
pub fn base_len() -> usize {
    BASE_COMPLAINTS.len()
}

/// The base corpus with priorities scored by `table`.
pub fn base_rows(table: &ScoringTable) -> Vec<TrainingRow> {
    BASE_COMPLAINTS
        .iter()
        .map(|&(text, category)| TrainingRow {
            text: text.to_string(),
            category: category.to_string(),
            priority: table.score(text, category).tier,
        })
        .collect()
}

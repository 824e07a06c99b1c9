mod control;
mod helpers;
mod listing;
mod live_audio;
mod persistence;


mod round_trip;

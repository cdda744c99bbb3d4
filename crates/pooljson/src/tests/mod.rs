
mod property_overlay;
mod property_roundtrip;

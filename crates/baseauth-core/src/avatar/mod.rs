/*
[INPUT]:  Image transport backends
[OUTPUT]: Avatar loading with caching and fallback
[POS]:    Avatar layer - module wiring
[UPDATE]: When avatar components change
*/

mod fetcher;
mod loader;

pub use fetcher::{FetchedImage, HttpImageFetcher, ImageFetcher, MockImageFetcher};
pub use loader::AvatarLoader;

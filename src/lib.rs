//! GeoCanvas — fetch geometric SVG icons, scatter them on a canvas, drag them
//! around and show each new icon's size and dominant color.

pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod io;
pub mod settings;

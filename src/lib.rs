/*
    toyboxtool - A Toybox save container parser, verifier and editor
    Copyright (C) 2025 toyboxtool contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//clippy config
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions, // Cmp1Header in container, ToyRecord in records, reads fine
    clippy::wildcard_imports,        // this is only done for my own crates, others are specified
    clippy::struct_excessive_bools   // arguments struct, can't change much
)]

use clap::Parser;

#[macro_use]
pub mod utils;
pub mod error;
pub mod checksum;
pub mod container;
pub mod records;
pub mod dxt1;
pub mod inject;
#[cfg(feature = "tokio")]
pub mod offload;

pub use error::{Error, Result};

#[derive(Parser, Debug, Clone)]
#[clap(author="toyboxtool contributors", version="1.0", about="A Toybox save container parser and editor, made in Rust", disable_version_flag=true)]
pub struct Args {
    //main args
    #[clap(help="Input save container or zip archive", value_name="INPUT")]
    pub filename: String,
    #[clap(help="Output filename", value_name="OUTPUT")]
    pub outfile: Option<String>,
    #[clap(short='v', long, help="Verify the container checksums and padding")]
    pub verify: bool,
    #[clap(short='d', help="Only decompress, write the payload text to OUTPUT")]
    pub dec: bool,

    //getters
    #[clap(short, help="Output all info about the container", help_heading="Getters")]
    pub all: bool,
    #[clap(short='r', long="records", help="List the toy records found in the payload", help_heading="Getters")]
    pub records: bool,
    #[clap(short='s', help="Save the stored screenshot as a PNG file", value_name="FILE", help_heading="Getters")]
    pub savescreenshot: Option<String>,

    //setters
    #[clap(short='N', help="Set the authored name", value_name="NAME", help_heading="Setters")]
    pub setname: Option<String>,
    #[clap(short='E', help="Set the authored description", value_name="DESC", help_heading="Setters")]
    pub setdesc: Option<String>,
    #[clap(short='I', help="Replace the screenshot with an image file", value_name="FILE", help_heading="Setters")]
    pub setscreenshot: Option<String>,
    #[clap(short='R', help="Set the text of a record, KIND is text, challenge or prompt (challenge takes TITLE|DESC)", value_names = &["KIND", "ID", "TEXT"], num_args = 3, help_heading="Setters")]
    pub setrecord: Option<Vec<String>>,
}

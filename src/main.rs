use {
    toyboxtool::{
        Args,
        Result,
        utils::*,
        container::{self, SaveContainer},
        dxt1,
        inject::{self, InjectOptions},
        records::{RecordKind, ToyRecord, ToyText},
    },
    clap::Parser,
    std::fs,
    colored::Colorize,
};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

fn verdict(ok: bool, yes: &str, no: &str) -> colored::ColoredString {
    if ok { yes.green() } else { no.red() }
}

fn print_container(raw: &[u8], args: &Args) {
    let cont = SaveContainer::parse(raw).unwrap_or_else(|e| panic!("Not a save container: {e}"));
    if args.all {
        if let Some(head) = cont.leading_header() {
            println!("{head}");
        }
        println!("{}", cont.head);
        println!("Marker Offset: {:#X}", cont.magic_offset);
    }
    if args.verify {
        let ver = cont.verify();
        println!("Uncompressed size is {}", verdict(ver.uncompressed_size, "correct", "incorrect"));
        println!("Uncompressed checksum is {}", verdict(ver.uncompressed_check, "correct", "incorrect"));
        println!("Compressed checksum is {}", verdict(ver.compressed_check, "correct", "incorrect"));
        println!("Block padding is {}", verdict(ver.padding, "correct", "incorrect"));
        println!("This container is {}", verdict(ver.is_valid(), "valid", "invalid"));
    }
    if args.records {
        let payload = cont.inflate().unwrap_or_else(|e| panic!("Cannot decompress payload: {e}"));
        let toy = ToyText::parse(&payload);
        if toy.records.is_empty() {
            println!("No toy records found");
        }
        let mut records: Vec<&ToyRecord> = toy.records.iter().collect();
        records.sort_by_key(|r| r.key());
        for rec in records {
            let (kind, id) = rec.key();
            println!("{kind} #{id}:");
            for value in toy.values(rec) {
                println!("\t\"{value}\"");
            }
        }
    }
    if let Some(path) = &args.savescreenshot {
        let data = inject::screenshot_from_container(raw).unwrap_or_else(|e| panic!("Cannot read screenshot: {e}"));
        dxt1::decode(&data, SCREENSHOT_WIDTH, SCREENSHOT_HEIGHT)
            .save(path)
            .unwrap_or_else(|e| panic!("Unable to write to \"{path}\": {e}"));
    }
    if args.dec {
        if let Some(path) = &args.outfile {
            write_file(path, &cont.inflate().unwrap_or_else(|e| panic!("Cannot decompress payload: {e}")));
        }
    }
}

fn set_record(raw: &[u8], spec: &[String]) -> Result<Vec<u8>> {
    let [kind, id, text] = spec else { panic!("-R takes KIND ID TEXT") };
    let id: u32 = id.parse().unwrap_or_else(|_| panic!("Invalid record id: {id}"));
    let mut toy = ToyText::parse(&container::decompress(raw)?);
    match kind.as_str() {
        "text" => toy.set_text_block(id, &text.lines().collect::<Vec<_>>())?,
        "challenge" => {
            let (title, desc) = text.split_once('|').unwrap_or((text.as_str(), ""));
            toy.set_challenge(id, title, desc)?;
        }
        "prompt" => toy.set_prompt(id, text)?,
        x => panic!("Invalid record kind: {x}, expected {}, {} or {}",
                    RecordKind::TextCreator, RecordKind::ChallengeMaker, RecordKind::InputToy),
    }
    container::recompress(&toy.to_bytes(), raw)
}

fn apply_edits(raw: &[u8], args: &Args, shot: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut out = raw.to_vec();
    if args.setname.is_some() || args.setdesc.is_some() {
        out = inject::edit_metadata_in_container(&out, args.setname.as_deref(), args.setdesc.as_deref())?;
    }
    if let Some(shot) = shot {
        out = inject::inject_screenshot_into_container(&out, shot)?;
    }
    if let Some(spec) = &args.setrecord {
        out = set_record(&out, spec)?;
    }
    Ok(out)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let file: Vec<u8> = fs::read(&args.filename).unwrap_or_else(|e| panic!("Cannot read input, error: {e}"));
    let is_zip = file.len() > 4 && file[..4] == ZIP_MAGIC;
    let opts = InjectOptions::default();

    let editing = args.setname.is_some() || args.setdesc.is_some() || args.setscreenshot.is_some() || args.setrecord.is_some();
    if !editing {
        if is_zip {
            let (name, raw) = inject::extract_save(&file, &opts).unwrap_or_else(|e| panic!("{e}"));
            println!("Save entry: {name}");
            print_container(&raw, &args);
        } else {
            print_container(&file, &args);
        }
        return;
    }

    let Some(path) = &args.outfile else { panic!("No output file specified") };
    let shot = args.setscreenshot.as_ref().map(|p| {
        let img = fs::read(p).unwrap_or_else(|e| panic!("Cannot read image, error: {e}"));
        dxt1::encode_bytes(&img, opts.width, opts.height).unwrap_or_else(|e| panic!("{e}"))
    });

    let newfile = if is_zip {
        let rewrite = inject::rewrite_archive(&file, &opts, |raw| apply_edits(raw, &args, shot.as_deref()))
            .unwrap_or_else(|e| panic!("{e}"));
        for outcome in &rewrite.outcomes {
            match &outcome.result {
                Ok(()) => println!("{} {}", "Updated".green(), outcome.name),
                Err(e) => println!("{} to update {}: {e}", "Failed".red(), outcome.name),
            }
        }
        rewrite.into_archive().unwrap_or_else(|e| panic!("Nothing was updated: {e}"))
    } else {
        apply_edits(&file, &args, shot.as_deref()).unwrap_or_else(|e| panic!("{e}"))
    };
    write_file(path, &newfile);
}

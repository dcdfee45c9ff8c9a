use jvmpatch::jvm::class_file::ClassFile;
use jvmpatch::*;

use clap::{crate_version, Arg, ArgAction, Command};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn cli() -> Command {
    Command::new("JVM class patcher")
        .version(crate_version!())
        .about("Splice static hook calls into JVM classes, the way the load-time patcher does")
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .help("Name the class is loaded under (defaults to the name in the class file)"),
        )
        .arg(
            Arg::new("transformed-name")
                .long("transformed-name")
                .value_name("NAME")
                .help("Stable name of the class (defaults to the name, looked up in the mappings)"),
        )
        .arg(
            Arg::new("obfuscated")
                .long("obfuscated")
                .action(ArgAction::SetTrue)
                .requires("transformed-name")
                .help(
                    "Members use obfuscated names. Needs --transformed-name, since the built-in \
                     mappings only know the obfuscated names of types that appear in descriptors",
                ),
        )
        .arg(
            Arg::new("mappings")
                .long("mappings")
                .value_name("FILE")
                .help("SRG mappings to use instead of the built-in ones"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("FILE")
                .help("Where to write the class (defaults to `INPUT.patched.class`)"),
        )
        .arg(
            Arg::new("list-rules")
                .long("list-rules")
                .action(ArgAction::SetTrue)
                .help("Print the configured rules and exit"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Class file to patch")
                .required_unless_present("list-rules")
                .index(1),
        )
}

fn main() -> Result<(), patch::Error> {
    env_logger::init();

    let matches = cli().get_matches();

    let mut settings = patch::Settings::new()?;
    if let Some(mappings_file) = matches.get_one::<String>("mappings") {
        log::info!("Reading mappings from '{}'", mappings_file);
        let source = fs::read_to_string(mappings_file)?;
        settings = settings.with_mappings(patch::Mappings::parse_srg(&source)?);
    }
    let transformer = patch::Transformer::new(&settings)?;

    if matches.get_flag("list-rules") {
        for rule in transformer.rules().iter() {
            println!(
                "{}.{}{} -> {}.{}{} ({:?}, {:?})",
                rule.identity.type_name,
                rule.identity.method_name.stable,
                rule.identity.descriptor.stable,
                rule.hook.owner,
                rule.hook.name,
                rule.hook.descriptor.stable,
                rule.slots,
                rule.insertion,
            );
        }
        return Ok(());
    }

    let input = match matches.get_one::<String>("INPUT") {
        Some(input) => input,
        None => return Ok(()),
    };
    log::info!("Reading '{}'", input);
    let bytes = fs::read(input)?;

    // Work out the names the host would have handed us
    let name = match matches.get_one::<String>("name") {
        Some(name) => name.replace('/', "."),
        None => {
            let class_file = ClassFile::parse(&bytes)?;
            let class_name = class_file
                .class_name()
                .map_err(|kind| jvm::Error::malformed(0, kind))?;
            class_name.replace('/', ".")
        }
    };
    let transformed_name = match matches.get_one::<String>("transformed-name") {
        Some(transformed_name) => transformed_name.replace('/', "."),
        None => {
            let internal = name.replace('.', "/");
            settings.mappings.stable_class(&internal).replace('/', ".")
        }
    };
    let obfuscated = matches.get_flag("obfuscated") || name != transformed_name;
    log::debug!(
        "'{}' loaded as '{}' (obfuscated: {})",
        transformed_name,
        name,
        obfuscated
    );

    let patched = transformer.patch(&transformed_name, &bytes, obfuscated)?;
    if patched.outcomes.is_empty() {
        println!("{}: no rules", transformed_name);
    }
    for outcome in &patched.outcomes {
        println!("{}", outcome);
    }

    let output = match matches.get_one::<String>("output") {
        Some(output) => PathBuf::from(output),
        None => Path::new(input).with_extension("patched.class"),
    };
    if output == Path::new(input) {
        let msg = format!("refusing to overwrite the input '{}'", input);
        return Err(patch::Error::IoError(io::Error::new(io::ErrorKind::Other, msg)));
    }
    log::info!("Writing '{}'", output.display());
    fs::write(&output, &patched.bytes)?;

    Ok(())
}

use anyhow::Context;
use structopt::StructOpt;

use emvread::{
    DefaultSchemeResolver, DefaultTerminal, EmvReader, PcscTransceiver, ReaderConfig,
};

#[derive(Debug, StructOpt)]
struct Options {
    #[structopt(
        short,
        long,
        default_value = "0",
        help = "Reader index, see list-readers"
    )]
    reader: usize,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(about = "List connected readers")]
    ListReaders,
    #[structopt(about = "Read the public data of the card on the reader")]
    Read {
        #[structopt(long, help = "Select the contact PSE instead of the contactless PPSE")]
        contact: bool,
        #[structopt(long, help = "Do not extract the transaction log")]
        skip_log: bool,
        #[structopt(long, help = "Stop at the first application that reads successfully")]
        first_app_only: bool,
    },
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let options = Options::from_args();
    let context =
        pcsc::Context::establish(pcsc::Scope::User).context("Failed to create PCSC session")?;

    match options.cmd {
        Command::ListReaders => list_readers(&context),
        Command::Read {
            contact,
            skip_log,
            first_app_only,
        } => {
            let card = get_card(&options, &context).context("Failed to connect to card")?;
            let config = ReaderConfig {
                contactless: !contact,
                read_transactions: !skip_log,
                read_all_aids: !first_app_only,
            };

            let mut transceiver = PcscTransceiver::new(card);
            let terminal = DefaultTerminal;
            let schemes = DefaultSchemeResolver;
            let res = EmvReader::new(&mut transceiver, &terminal, &schemes, config).read_card();
            println!("{:#?}", res);
            // Reset the card so the next reader starts from a clean slate
            let card = transceiver.into_inner();
            if card.disconnect(pcsc::Disposition::ResetCard).is_err() {
                eprintln!("Failed to reset card, you may need to manually unplug the card");
            }
            res?;
            Ok(())
        }
    }
}

fn list_readers(context: &pcsc::Context) -> anyhow::Result<()> {
    let readers = context
        .list_readers_owned()
        .context("Failed to find readers")?;
    for (idx, reader) in readers.iter().enumerate() {
        println!("{}: {:?}", idx, reader)
    }
    Ok(())
}

fn get_card(options: &Options, context: &pcsc::Context) -> anyhow::Result<pcsc::Card> {
    let readers = context
        .list_readers_owned()
        .context("Failed to list readers")?;
    if options.reader >= readers.len() {
        anyhow::bail!(
            "No reader at index {}, only {} readers found",
            options.reader,
            readers.len()
        );
    }
    Ok(context.connect(
        &readers[options.reader],
        pcsc::ShareMode::Exclusive,
        pcsc::Protocols::ANY,
    )?)
}

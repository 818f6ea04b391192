/// Generate the Argon2 hash for the site access gate
///
/// The output goes into PP_ACCESS_PASSWORD_HASH.
use anyhow::Context;
use clap::Parser;
use prompt_party::account::hash_password;

#[derive(Parser)]
#[command(name = "hash-access-password", about = "Hash a site password for the access gate")]
struct Args {
    /// Password to hash; prompted on stdin when omitted
    password: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let password = match args.password {
        Some(password) => password,
        None => {
            eprint!("Password: ");
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("reading password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        anyhow::bail!("password cannot be empty");
    }

    let hash = hash_password(&password).context("hashing password")?;
    println!("{}", hash);
    Ok(())
}

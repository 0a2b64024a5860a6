//! Provisioning script run once over ssh after the instance boots.

const BREW_SHELLENV: &str = "eval \"$(/home/linuxbrew/.linuxbrew/bin/brew shellenv)\"";

/// Idempotent setup: docker, sshd gateway ports, and unison from Homebrew.
#[must_use]
pub fn bootstrap_script(user: &str) -> String {
    let steps = [
        String::from("set -x"),
        String::from("sudo sysctl -w net.core.somaxconn=4096"),
        String::from("sudo apt-get -y update"),
        String::from("sudo apt-get -y install build-essential curl file git docker.io"),
        format!("sudo usermod -aG docker {user}"),
        String::from("sudo systemctl daemon-reload"),
        String::from("sudo systemctl restart docker.service"),
        String::from("sudo systemctl enable docker.service"),
        String::from(
            "sudo sed -i -e '/GatewayPorts/ s/^.*$/GatewayPorts yes/' /etc/ssh/sshd_config",
        ),
        String::from("sudo service sshd restart"),
        String::from(
            "NONINTERACTIVE=1 /bin/bash -c \"$(curl -fsSL \
             https://raw.githubusercontent.com/Homebrew/install/master/install.sh)\"",
        ),
        format!("echo '{BREW_SHELLENV}' >> /home/{user}/.profile"),
        String::from(BREW_SHELLENV),
        String::from("brew install unison"),
        String::from("sudo cp \"$(which unison)\" /usr/local/bin/"),
        String::from("sudo cp \"$(which unison-fsmonitor)\" /usr/local/bin/"),
    ];
    steps.join(" && ")
}

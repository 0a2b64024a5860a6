//! Ubuntu 18.04 LTS (hvm:ebs-ssd) images per region.

const REGION_IMAGES: &[(&str, &str)] = &[
    ("af-south-1", "ami-079652134906bcbad"),
    ("ap-east-1", "ami-c42464b5"),
    ("ap-northeast-1", "ami-0cfa3caed4b487e77"),
    ("ap-northeast-2", "ami-0d777f54156eae7d9"),
    ("ap-northeast-3", "ami-056ee91a6ed694f5d"),
    ("ap-south-1", "ami-02d55cb47e83a99a0"),
    ("ap-southeast-1", "ami-063e3af9d2cc7fe94"),
    ("ap-southeast-2", "ami-0bc49f9283d686bab"),
    ("ca-central-1", "ami-065ba2b6b298ed80f"),
    ("eu-central-1", "ami-0d359437d1756caa8"),
    ("eu-north-1", "ami-0f920d75f0ce2c4bb"),
    ("eu-south-1", "ami-08bb6fa4a2d8676d4"),
    ("eu-west-1", "ami-089cc16f7f08c4457"),
    ("eu-west-2", "ami-00f6a0c18edb19300"),
    ("eu-west-3", "ami-0e11cbb34015ff725"),
    ("me-south-1", "ami-0ca656ad4cf917e1f"),
    ("sa-east-1", "ami-0faf2c48fc9c8f966"),
    ("us-east-1", "ami-0ac80df6eff0e70b5"),
    ("us-east-2", "ami-0a63f96e85105c6d3"),
    ("us-west-1", "ami-0d705db840ec5f0c5"),
    ("us-west-2", "ami-053bc2e89490c5ab7"),
];

/// Default image for `region`, if one is known.
#[must_use]
pub fn default_image_for(region: &str) -> Option<&'static str> {
    REGION_IMAGES
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, image)| *image)
}

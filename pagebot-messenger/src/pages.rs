//! Static policy pages required by the Messenger platform app review.

pub const TERMS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta charset="UTF-8">
	<title>User Terms of Service</title>
	<style>
		body { font-family: Arial, sans-serif; margin: 40px; }
		h1 { color: #333366; }
		p { margin: 20px 0; }
		ul { margin: 20px 0; }
	</style>
</head>
<body>
	<h1>User Terms of Service</h1>
	<p>Welcome to this application! By using our application, you agree to the following terms and conditions:</p>
	<ul>
		<li><strong>Acceptance of Terms</strong>: When you access our application, you agree to be bound by these Terms of Service.</li>
		<li><strong>Modification of Terms</strong>: We reserve the right to modify these terms at any time. Your continued use of the application signifies your acceptance of any adjustments.</li>
		<li><strong>User Conduct</strong>: You are responsible for all your activity in connection with the service and ensuring that all content uploaded complies with applicable laws and regulations.</li>
		<li><strong>Intellectual Property</strong>: All content included on the application, such as text, graphics, logos, and software, is the property of this application or its content suppliers.</li>
	</ul>
	<p>For more information or if you have any questions, please contact us at this site.</p>
</body>
</html>
"#;

pub const PRIVACY_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta charset="UTF-8">
	<title>Privacy Policy</title>
	<style>
		body { font-family: Arial, sans-serif; margin: 40px; }
		h1 { color: #333366; }
		p { margin: 20px 0; }
		ul { margin: 20px 0; }
	</style>
</head>
<body>
	<h1>Privacy Policy</h1>
	<p>At this application, we respect the privacy of our users. This Privacy Policy outlines how we collect, use, and protect your personal information:</p>
	<ul>
		<li><strong>Data Collection</strong>: We collect information such as your name, email address, and usage data to provide and improve our service.</li>
		<li><strong>Use of Information</strong>: Your information helps us to personalize the service and improve your experience.</li>
		<li><strong>Sharing of Information</strong>: We do not sell, trade, or otherwise transfer to outside parties your personally identifiable information without your consent.</li>
		<li><strong>Data Security</strong>: We implement a variety of security measures to maintain the safety of your personal information.</li>
	</ul>
	<p>We may update our Privacy Policy from time to time. We will notify you of any changes by posting the new Privacy Policy on this page.</p>
	<p>If you have any questions about this Privacy Policy, please contact us at this site.</p>
</body>
</html>
"#;
